use tracing_subscriber::{EnvFilter, fmt};

/// Directives used when `RUST_LOG` is unset: worker crates at `info`,
/// chatty transport and pool crates only on warnings.
const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn,hyper=warn,reqwest=warn,alloy_transport_http=warn";

/// Initialise the global tracing subscriber.
///
/// Calling it twice is harmless; the second call keeps the first subscriber.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
