//! Logging infrastructure for oasgen.
//!
//! # Usage
//!
//! ```ignore
//! use oasgen_telemetry::{init_logging, LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("info")
//!     .with_log_format(LogFormat::Json);
//!
//! init_logging(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::{events, init_logging};

#[doc(hidden)]
pub use tracing;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// The log level is not a valid filter directive.
    #[error("invalid log level '{0}': {1}")]
    InvalidLevel(String, String),
}
