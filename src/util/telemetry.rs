//! Telemetry helpers for structured logging and tracing.

/// Initialize tracing with an env-based subscriber.
///
/// `RUST_LOG` takes precedence when set; otherwise protector grant/release
/// activity from this crate is logged at info level and everything else is
/// silenced. Embedders that have already installed their own subscriber are
/// left untouched.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("prometheus_resource_guard=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
