//! Error types for Lekse.

use thiserror::Error;

/// Library-level error type for Lekse operations.
#[derive(Error, Debug)]
pub enum LekseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream request timed out: {0}")]
    Timeout(String),

    #[error("Malformed upstream response: {0}")]
    Parse(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Result type alias for Lekse operations.
pub type Result<T> = std::result::Result<T, LekseError>;
