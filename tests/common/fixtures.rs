#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use wireloom::node::Node;
use wireloom::pipeline::Pipeline;
use wireloom::providers::InMemoryWorkbench;
use wireloom::types::{NodeKind, RunMode};

/// Five staff records; three are in engineering.
pub fn staff() -> Value {
    json!([
        {"id": "s1", "name": "Ada", "dept": "eng", "tickets": 5},
        {"id": "s2", "name": "Grace", "dept": "eng", "tickets": 3},
        {"id": "s3", "name": "Alan", "dept": "ops", "tickets": 2},
        {"id": "s4", "name": "Edsger", "dept": "eng", "tickets": 8},
        {"id": "s5", "name": "Barbara", "dept": "sales", "tickets": 1},
    ])
}

/// Origin node embedding `rows` directly in its configuration.
pub fn import_node(rows: Value) -> Node {
    Node::new(NodeKind::ExternalImport).with_config([("data".to_string(), rows)])
}

pub fn filter_node(field: &str, operator: &str, value: Value) -> Node {
    Node::new(NodeKind::Filter).with_config([
        ("field".to_string(), json!(field)),
        ("operator".to_string(), json!(operator)),
        ("value".to_string(), value),
    ])
}

pub fn count_node() -> Node {
    Node::new(NodeKind::Aggregate).with_config([("function".to_string(), json!("count"))])
}

/// A pipeline that schedules nothing on its own.
pub fn manual_pipeline(name: &str) -> Pipeline {
    Pipeline::new(name).with_run_mode(RunMode::Manual)
}

/// A workbench with a `tickets` collection stamped for time travel.
pub fn stamped_workbench() -> InMemoryWorkbench {
    InMemoryWorkbench::new().with_collection(
        "tickets",
        vec![
            json!({"id": "t1", "title": "first",  "createdAt": "2024-01-10T00:00:00Z"}),
            json!({"id": "t2", "title": "second", "createdAt": "2024-03-05T00:00:00Z"}),
            json!({"id": "t3", "title": "third",  "createdAt": "2024-06-20T00:00:00Z"}),
        ],
    )
}

pub fn rfc3339(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .unwrap()
        .with_timezone(&Utc)
}
