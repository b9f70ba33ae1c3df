use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeftError {
    // Graph / input errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Run errors
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Execution not found: {0}")]
    NotFound(String),

    // Gateway errors
    #[error("Auth error: {0}")]
    Auth(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;
