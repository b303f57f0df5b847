//! Structured logging to stderr.
//!
//! Generated sources may be piped through stdout, so log output never goes
//! there.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

/// `RUST_LOG` wins over the configured level.
fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| TelemetryError::InvalidLevel(config.log_level.clone(), e.to_string())),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names for a generation run.
pub mod events {
    /// Reading of the input document has started.
    pub const LOAD_STARTED: &str = "load_started";

    /// The input document has been decoded.
    pub const DOCUMENT_LOADED: &str = "document_loaded";

    /// Schema type fields have been canonicalized.
    pub const DOCUMENT_NORMALIZED: &str = "document_normalized";

    /// Document fields and references have been checked.
    pub const DOCUMENT_VALIDATED: &str = "document_validated";

    /// An artifact's source text has been produced.
    pub const ARTIFACT_EMITTED: &str = "artifact_emitted";

    /// An artifact has been written to disk.
    pub const ARTIFACT_WRITTEN: &str = "artifact_written";

    /// All artifacts have been produced.
    pub const GENERATION_COMPLETED: &str = "generation_completed";

    /// A step failed and the run was aborted.
    pub const GENERATION_FAILED: &str = "generation_failed";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_load_started {
    ($($field:tt)*) => {
        $crate::tracing::info!(
            event = $crate::logging::events::LOAD_STARTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_loaded {
    ($($field:tt)*) => {
        $crate::tracing::info!(
            event = $crate::logging::events::DOCUMENT_LOADED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_normalized {
    ($($field:tt)*) => {
        $crate::tracing::debug!(
            event = $crate::logging::events::DOCUMENT_NORMALIZED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_document_validated {
    ($($field:tt)*) => {
        $crate::tracing::info!(
            event = $crate::logging::events::DOCUMENT_VALIDATED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_artifact_emitted {
    ($($field:tt)*) => {
        $crate::tracing::debug!(
            event = $crate::logging::events::ARTIFACT_EMITTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_artifact_written {
    ($($field:tt)*) => {
        $crate::tracing::info!(
            event = $crate::logging::events::ARTIFACT_WRITTEN,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_generation_completed {
    ($($field:tt)*) => {
        $crate::tracing::info!(
            event = $crate::logging::events::GENERATION_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_generation_failed {
    ($($field:tt)*) => {
        $crate::tracing::error!(
            event = $crate::logging::events::GENERATION_FAILED,
            $($field)*
        )
    };
}
