//! Logging integration for sequel-rs.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-compile spans.
//! The compilers themselves only emit `tracing` events; installing a
//! subscriber is left to the application.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info",
/// "sequel_query=trace"). In debug mode a pretty, human-readable format is
/// used; otherwise a structured JSON format is used.
///
/// Installing a subscriber twice is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one compile call.
///
/// Every event logged while the span is entered carries the operation
/// (`find`, `select`, `create`) and the table identity.
///
/// # Examples
///
/// ```
/// use sequel_core::logging::compile_span;
///
/// let span = compile_span("find", "foo");
/// let _guard = span.enter();
/// tracing::debug!("compiling");
/// ```
pub fn compile_span(operation: &str, table: &str) -> tracing::Span {
    tracing::debug_span!("compile", operation = operation, table = table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_is_idempotent() {
        let settings = Settings {
            log_level: "not a valid filter ===".to_string(),
            ..Settings::default()
        };
        setup_logging(&settings);
        setup_logging(&Settings::default());
    }

    #[test]
    fn test_compile_span_enter() {
        let span = compile_span("create", "bar");
        let _guard = span.enter();
        tracing::debug!("inside span");
    }
}
