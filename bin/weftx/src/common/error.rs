use weft_loader::{InstantiationError, InvokeError};

/// Error types for the weftx commands
#[derive(Debug, thiserror::Error)]
pub enum WeftxError {
    /// Failed to read or write a file
    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    /// Malformed JSON input
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Module could not be compiled or instantiated
    #[error("Instantiation error: {0}")]
    Instantiation(#[from] InstantiationError),

    /// Invocation against the guest failed
    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for the weftx commands
pub type Result<T> = std::result::Result<T, WeftxError>;
