use thiserror::Error;

use crate::llm::BackendError;

/// Main error type for kgquery
#[derive(Error, Debug)]
pub enum KgError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A text-generation backend call failed
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// Every backend in the fallback chain failed to initialize
    #[error("no text-generation backend available: {0}")]
    NoBackend(String),

    /// Image generation errors
    #[error("Image generation error: {0}")]
    Image(String),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using KgError
pub type Result<T> = std::result::Result<T, KgError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::BackendErrorKind;

    #[test]
    fn test_error_display() {
        let err = KgError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let kg_err: KgError = io_err.into();
        assert!(matches!(kg_err, KgError::Io(_)));
    }

    #[test]
    fn test_error_from_backend_keeps_message() {
        let backend_err = BackendError::new(BackendErrorKind::Quota, "ollama", "slow down");
        let kg_err: KgError = backend_err.into();
        assert!(matches!(kg_err, KgError::Backend(_)));
        assert!(kg_err.to_string().contains("slow down"));
    }

    #[test]
    fn test_no_backend_display() {
        let err = KgError::NoBackend("openai: key missing".to_string());
        assert_eq!(
            err.to_string(),
            "no text-generation backend available: openai: key missing"
        );
    }
}
