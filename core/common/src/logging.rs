// core/common/src/logging.rs
// Structured JSON logging setup and token redaction

use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

const VISIBLE_PREFIX: usize = 8;
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global JSON subscriber. Fails if one is already installed.
pub fn init_logging(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
        )
        .try_init()?;

    info!(
        service = service_name,
        "Logging initialized"
    );
    Ok(())
}

/// Pretty console output for local development.
pub fn init_console_logging(service_name: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().pretty().with_target(true))
        .try_init()?;

    info!(
        service = service_name,
        "Console logging initialized"
    );
    Ok(())
}

/// Short, log-safe form of a credential: a few leading characters at most.
pub fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(VISIBLE_PREFIX).collect();
    if secret.chars().count() <= VISIBLE_PREFIX * 2 {
        "[REDACTED]".to_string()
    } else {
        format!("{}...[REDACTED]", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_initialization_is_an_error() {
        // Only this test installs a global subscriber.
        assert!(init_logging("api-commons-test").is_ok());
        assert!(init_logging("api-commons-test").is_err());
        assert!(init_console_logging("api-commons-test").is_err());
    }

    #[test]
    fn test_redact_short_values_completely() {
        assert_eq!(redact("hunter2"), "[REDACTED]");
        assert_eq!(redact(""), "[REDACTED]");
    }

    #[test]
    fn test_redact_long_values_keeps_prefix() {
        let token = "eyJhbGciOiJIUzI1NiJ9.eyJuYW1lIjoiYWxpY2UifQ.signature";
        let redacted = redact(token);

        assert_eq!(redacted, "eyJhbGci...[REDACTED]");
        assert!(!redacted.contains("signature"));
    }

    #[test]
    fn test_redact_counts_characters() {
        let value = "ñ".repeat(40);
        assert!(redact(&value).starts_with(&"ñ".repeat(8)));
    }
}
