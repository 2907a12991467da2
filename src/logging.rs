use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// `RUST_LOG` wins over the configured filter; an unparsable filter falls back to `info`.
pub fn filter_from(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(configured: &str) {
    let result = tracing_subscriber::registry()
        .with(filter_from(configured))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("logging already initialised");
    }
}
