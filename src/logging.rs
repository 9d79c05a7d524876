//! Logging setup. OpenTelemetry export is out of scope for this edge
//! resolver (spec §1's peripheral concerns exclude observability beyond
//! logging) so this wraps `tracing-subscriber`'s `EnvFilter` directly
//! rather than the fuller OTEL pipeline a web-facing sibling service might
//! carry.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `debug` forces the `debug`
/// level; otherwise `RUST_LOG` is honoured, falling back to `info`.
pub fn init_logging(debug: bool) -> Result<(), String> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| format!("failed to install tracing subscriber: {e}"))
}
