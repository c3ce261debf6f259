//! Logging configuration with rotation support
//!
//! # Example
//!
//! ```rust
//! use kvstore::logging::init_logging;
//!
//! init_logging("logs", "kvnode.log", "info").unwrap();
//! ```

use crate::error::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with file rotation
///
/// - `directory`: directory to store logs
/// - `filename_prefix`: prefix for log files (e.g. "kvnode.log")
/// - `level`: default log level (e.g. "info", "debug")
pub fn init_logging(directory: &str, filename_prefix: &str, level: &str) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(filename_prefix)
        .build(directory)
        .map_err(|e| crate::error::Error::Internal(format!("failed to create log appender: {e}")))?;

    let console_layer = fmt::layer().with_target(false).compact();
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| crate::error::Error::Internal(format!("failed to init tracing: {e}")))?;

    Ok(())
}
