//! Error types for the watchtower service

/// Errors that can occur in the watchtower service
#[derive(Debug, thiserror::Error)]
pub enum WatchtowerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Report error: {0}")]
    Report(String),
}

/// Result type alias for watchtower operations
pub type Result<T> = std::result::Result<T, WatchtowerError>;
