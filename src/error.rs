//! Error types for VOCO

use std::time::Duration;

use thiserror::Error;

/// Result type alias for VOCO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in VOCO
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Word data could not be loaded or is malformed
    #[error("data error: {0}")]
    Data(String),

    /// Audio decoding or output error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech synthesis error (remote or system)
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// An audio unit did not settle in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Topic requires an active subscription
    #[error("subscription required: {0}")]
    SubscriptionRequired(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
