//! Logging initialization for the command line front-end.
//!
//! The library only emits `tracing` events; this installs the subscriber that prints
//! them. With the `profiling` feature, library scopes also show up as spans.

use tracing_subscriber::prelude::*;

/// Generic function to get environment variable, parsing it to the desired type.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Initialize logging with sensible defaults.
///
/// If RUST_LOG is not set, the level comes from LOG_LEVEL, falling back to `debug` for
/// debug builds and `info` otherwise.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    if std::env::var("RUST_LOG").is_err() {
        let default = get_env::<String>("LOG_LEVEL").unwrap_or_else(|| {
            if cfg!(debug_assertions) {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", default);
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    #[cfg(feature = "profiling")]
    tracing::info!("Logging initialized (profiling scopes enabled)");
    #[cfg(not(feature = "profiling"))]
    tracing::debug!("Logging initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_parses_value() {
        // PATH is set in every test environment but is not a number
        assert!(get_env::<String>("PATH").is_some());
        assert_eq!(get_env::<u32>("PATH"), None);
        assert_eq!(get_env::<u32>("MORPH_GRAPH_SURELY_UNSET_VARIABLE"), None);
    }
}
