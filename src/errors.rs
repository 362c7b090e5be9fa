use thiserror::Error;

use crate::logging::LoggingError;

/// Top-level error type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PristineError {
    /// Configuration loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Logging initialization error.
    #[error(transparent)]
    Logging(#[from] LoggingError),
    /// Unable to build Tokio runtime.
    #[error("Unable to build runtime: {0}")]
    Runtime(std::io::Error),
    /// Background pool error.
    #[error(transparent)]
    Pool(#[from] pristine_pools::Error),
}
