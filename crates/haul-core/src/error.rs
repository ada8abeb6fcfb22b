use thiserror::Error;

/// Application-wide error types for haul.
#[derive(Error, Debug)]
pub enum AppError {
    /// The submitted URL is not a well-formed http(s) URL.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No provider rule matched and strict provider support is enabled.
    #[error("Unsupported provider for URL: {0}")]
    UnsupportedProvider(String),

    /// A single extraction attempt failed (engine error text).
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Job identifier is unknown or the record was swept.
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The job has not reached `completed` yet.
    #[error("Download not completed. Status: {0}")]
    NotReady(String),

    /// The artifact expired and was removed.
    #[error("Downloaded file no longer available: {0}")]
    Gone(String),

    /// Artifact or credential filesystem operation failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Credential file content failed validation.
    #[error("Invalid credential file: {0}")]
    InvalidCredential(String),

    /// Configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An extraction attempt exceeded its time budget.
    #[error("Attempt timed out after {0} seconds")]
    Timeout(u64),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}
