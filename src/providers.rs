//! Collaborator interfaces the engine calls through.
//!
//! The engine itself holds no record data. Origin-family executors query a
//! [`Workbench`] for record collections and single records, and optionally
//! pass the result through a [`TemporalFilter`] that restricts a collection
//! to what was known as of the pipeline's current timestamp. Both are
//! implemented outside the engine; this module ships an in-memory workbench
//! and a timestamp-field filter as reference implementations for tests,
//! examples, and small embedders.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

/// Failures surfaced by collaborator implementations.
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    /// The requested collection does not exist.
    #[error("unknown collection: {id}")]
    #[diagnostic(
        code(wireloom::providers::unknown_collection),
        help("Check the node's collectionId against the workbench contents.")
    )]
    CollectionNotFound { id: String },

    /// Backend-specific failure (I/O, remote call, malformed store).
    #[error("provider backend error: {message}")]
    #[diagnostic(code(wireloom::providers::backend))]
    Backend { message: String },
}

/// Record-collection provider consumed by origin-family executors.
///
/// Records are free-form JSON objects; the engine never interprets them
/// beyond what individual executors document.
#[async_trait]
pub trait Workbench: Send + Sync {
    /// The current record set of a collection.
    async fn collection(&self, collection_id: &str) -> Result<Vec<Value>, ProviderError>;

    /// A single record by id, searched within one collection when given or
    /// across all collections otherwise. `Ok(None)` means "no such record",
    /// which is not a backend failure.
    async fn record(
        &self,
        record_id: &str,
        collection_id: Option<&str>,
    ) -> Result<Option<Value>, ProviderError>;
}

/// Restricts a record set to what was known as of a timestamp.
#[async_trait]
pub trait TemporalFilter: Send + Sync {
    async fn known_as_of(
        &self,
        records: Vec<Value>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Value>, ProviderError>;
}

/// Volatile workbench backed by in-process maps.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use wireloom::providers::{InMemoryWorkbench, Workbench};
///
/// # async fn demo() {
/// let bench = InMemoryWorkbench::new()
///     .with_collection("tickets", vec![json!({"id": "t1", "open": true})]);
///
/// let rows = bench.collection("tickets").await.unwrap();
/// assert_eq!(rows.len(), 1);
/// assert!(bench.collection("absent").await.is_err());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryWorkbench {
    collections: FxHashMap<String, Vec<Value>>,
}

impl InMemoryWorkbench {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a collection.
    #[must_use]
    pub fn with_collection(mut self, id: impl Into<String>, records: Vec<Value>) -> Self {
        self.collections.insert(id.into(), records);
        self
    }

    pub fn insert_collection(&mut self, id: impl Into<String>, records: Vec<Value>) {
        self.collections.insert(id.into(), records);
    }

    fn id_matches(record: &Value, wanted: &str) -> bool {
        match record.get("id") {
            Some(Value::String(s)) => s == wanted,
            Some(Value::Number(n)) => n.to_string() == wanted,
            _ => false,
        }
    }
}

#[async_trait]
impl Workbench for InMemoryWorkbench {
    async fn collection(&self, collection_id: &str) -> Result<Vec<Value>, ProviderError> {
        self.collections
            .get(collection_id)
            .cloned()
            .ok_or_else(|| ProviderError::CollectionNotFound {
                id: collection_id.to_string(),
            })
    }

    async fn record(
        &self,
        record_id: &str,
        collection_id: Option<&str>,
    ) -> Result<Option<Value>, ProviderError> {
        match collection_id {
            Some(id) => {
                let records =
                    self.collections
                        .get(id)
                        .ok_or_else(|| ProviderError::CollectionNotFound {
                            id: id.to_string(),
                        })?;
                Ok(records
                    .iter()
                    .find(|r| Self::id_matches(r, record_id))
                    .cloned())
            }
            None => Ok(self
                .collections
                .values()
                .flatten()
                .find(|r| Self::id_matches(r, record_id))
                .cloned()),
        }
    }
}

/// Temporal filter keyed on an RFC 3339 timestamp field.
///
/// A record is "known" as of `at` when its field parses to a timestamp at or
/// before `at`. Records without the field, or with an unparseable value, are
/// treated as always known.
#[derive(Clone, Debug)]
pub struct TimestampFieldFilter {
    field: String,
}

impl TimestampFieldFilter {
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Default for TimestampFieldFilter {
    fn default() -> Self {
        Self::new("createdAt")
    }
}

#[async_trait]
impl TemporalFilter for TimestampFieldFilter {
    async fn known_as_of(
        &self,
        records: Vec<Value>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Value>, ProviderError> {
        Ok(records
            .into_iter()
            .filter(|record| match record.get(&self.field).and_then(Value::as_str) {
                Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                    Ok(stamp) => stamp.with_timezone(&Utc) <= at,
                    Err(_) => true,
                },
                None => true,
            })
            .collect())
    }
}
