use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn setup_logging(level: &str, json_format: bool) {
    let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| filter_spec(level));
    let filter = EnvFilter::from_str(&directives).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        subscriber
            .with(fmt::layer().json().with_target(false).with_current_span(false))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).compact())
            .init();
    }

    tracing::debug!(filter = %directives, json = json_format, "Logging initialized");
}

/// A bare level gets the noisy HTTP crates capped at info; full directive
/// strings pass through untouched.
pub fn filter_spec(level: &str) -> String {
    let level = level.trim();
    if level.contains(',') || level.contains('=') {
        level.to_string()
    } else {
        format!("{level},hyper=info,hyper_util=info,reqwest=info,alloy_transport_http=info")
    }
}
