use tracing_subscriber::EnvFilter;

/// Env var consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "NATPREP_LOG";

/// Install a stderr subscriber filtered by `NATPREP_LOG`, then `RUST_LOG`,
/// then `info`.
///
/// Library crates log through the `log` facade; the subscriber's log bridge
/// picks those records up.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
