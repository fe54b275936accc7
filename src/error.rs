//! Error types for Autopost

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum AutopostError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text generator failure (CLI missing, non-zero exit, timeout, empty output)
    #[error("Generator error: {0}")]
    Generator(String),

    /// Poster failure; history is never updated when this is returned
    #[error("Poster error: {0}")]
    Poster(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AutopostError {
    /// Process exit code for this error.
    ///
    /// 1 = configuration, 2 = initialization, 3 = generation, 4 = posting.
    pub fn exit_code(&self) -> i32 {
        match self {
            AutopostError::Config(_) | AutopostError::TomlParse(_) | AutopostError::Validation(_) => 1,
            AutopostError::Io(_) | AutopostError::Json(_) => 2,
            AutopostError::Generator(_) => 3,
            AutopostError::Poster(_) => 4,
        }
    }
}

/// Result type alias for Autopost operations
pub type Result<T> = std::result::Result<T, AutopostError>;
