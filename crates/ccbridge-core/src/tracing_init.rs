//! Tracing/logging initialization for the bridge binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter directive used when `RUST_LOG` is unset.
///
/// The bridge's own crates and the HTTP trace layer share one level.
pub fn default_filter(log_level: &str) -> String {
    format!("ccbridge_server={log_level},ccbridge_core={log_level},tower_http={log_level}")
}

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. With `log_json` every event is
/// emitted as one flattened JSON object per line.
pub fn init_tracing(log_level: &str, log_json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_json {
        registry
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_all_crates() {
        let filter = default_filter("debug");
        assert_eq!(
            filter,
            "ccbridge_server=debug,ccbridge_core=debug,tower_http=debug"
        );
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
