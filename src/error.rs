//! Error types for Granska.
//!
//! Provider and orchestration failures never surface here: they are folded
//! into `CallOutcome` messages at the adapter boundary. This enum covers the
//! fallible edges that remain, configuration and storage.

use thiserror::Error;

/// Library-level error type for Granska operations.
#[derive(Error, Debug)]
pub enum GranskaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for Granska operations.
pub type Result<T> = std::result::Result<T, GranskaError>;
