//! Engine tuning knobs, resolved from the environment with sane defaults.
//!
//! A `.env` file is honored when present. `WIRELOOM_DEBOUNCE_MS` sets the
//! time-cursor debounce window and `WIRELOOM_EVENT_BUFFER` the event
//! channel capacity.

use std::time::Duration;

/// Engine configuration carried by every pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period after the last time-cursor move before a full
    /// re-execution becomes due, in milliseconds.
    pub debounce_ms: u64,
    /// Event channel capacity before best-effort emission starts dropping.
    pub event_buffer: usize,
}

impl EngineConfig {
    pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
    pub const DEFAULT_EVENT_BUFFER: usize = 1024;

    #[must_use]
    pub fn new(debounce_ms: u64, event_buffer: usize) -> Self {
        Self {
            debounce_ms,
            event_buffer: if event_buffer == 0 {
                Self::DEFAULT_EVENT_BUFFER
            } else {
                event_buffer
            },
        }
    }

    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    #[must_use]
    pub fn with_event_buffer(self, event_buffer: usize) -> Self {
        Self::new(self.debounce_ms, event_buffer)
    }

    /// The debounce window as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn env_u64(key: &str, fallback: u64) -> u64 {
        std::env::var(key)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(fallback)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self::new(
            Self::env_u64("WIRELOOM_DEBOUNCE_MS", Self::DEFAULT_DEBOUNCE_MS),
            Self::env_u64("WIRELOOM_EVENT_BUFFER", Self::DEFAULT_EVENT_BUFFER as u64) as usize,
        )
    }
}
