//! Tracing bootstrap for binaries, demos, and ad-hoc debugging.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the host's call. [`init`] wires up the conventional one: an
//! `EnvFilter` honoring `RUST_LOG` over a compact fmt layer.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global tracing subscriber filtered by `RUST_LOG`.
///
/// Falls back to `warn,wireloom=info` when `RUST_LOG` is unset. Safe to
/// call more than once; later calls leave the existing subscriber in place.
///
/// # Examples
///
/// ```rust
/// wireloom::telemetry::init();
/// tracing::info!("pipeline engine ready");
/// ```
pub fn init() {
    init_with_directives("warn,wireloom=info");
}

/// Install a global tracing subscriber with explicit fallback directives.
///
/// `directives` is used only when `RUST_LOG` is unset; invalid directives
/// within it are ignored.
pub fn init_with_directives(directives: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
