//! # Structured Logging
//!
//! Environment-aware tracing initialization. Console output is always on;
//! production environments switch to JSON lines for log shipping.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// `CLINIQ_LOG` (or `RUST_LOG`) overrides the environment-derived level.
/// Safe to call from multiple components; later calls are no-ops, and an
/// already-installed global subscriber (e.g. from a host application) is
/// left in place.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_env("CLINIQ_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let result = if environment == "production" {
            tracing_subscriber::registry()
                .with(fmt::layer().json().with_target(true))
                .with(filter)
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_ansi(true))
                .with(filter)
                .try_init()
        };

        if result.is_err() {
            tracing::debug!("global tracing subscriber already initialized, continuing");
        }
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CLINIQ_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("test"), "debug");
    }
}
