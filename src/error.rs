use std::io;
use thiserror::Error;

/// Main error type for hffs operations
#[derive(Error, Debug)]
pub enum HffsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Revision not found: {0}")]
    RevisionNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl HffsError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            HffsError::Network(_) => true,
            HffsError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }

    /// Whether the error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HffsError::NotFound(_) | HffsError::RepositoryNotFound(_) | HffsError::RevisionNotFound(_)
        )
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            HffsError::NotFound(_)
            | HffsError::RepositoryNotFound(_)
            | HffsError::RevisionNotFound(_) => io::ErrorKind::NotFound,
            HffsError::IsADirectory(_) => io::ErrorKind::Other,
            HffsError::InvalidPath(_) | HffsError::InvalidArgument(_) => {
                io::ErrorKind::InvalidInput
            }
            HffsError::NotSupported(_) => io::ErrorKind::Unsupported,
            HffsError::PermissionDenied(_) | HffsError::Auth(_) => {
                io::ErrorKind::PermissionDenied
            }
            HffsError::Io(e) => e.kind(),
            HffsError::Serialization(_) => io::ErrorKind::InvalidData,
            HffsError::Http { .. } | HffsError::Network(_) | HffsError::Config(_) => {
                io::ErrorKind::Other
            }
        }
    }
}

impl From<HffsError> for io::Error {
    fn from(err: HffsError) -> Self {
        match err {
            HffsError::Io(e) => e,
            other => io::Error::new(other.io_kind(), other),
        }
    }
}

impl From<reqwest::Error> for HffsError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => HffsError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => HffsError::Serialization(err.to_string()),
            None => HffsError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HffsError {
    fn from(err: serde_json::Error) -> Self {
        HffsError::Serialization(err.to_string())
    }
}

/// Result type alias for hffs operations
pub type Result<T> = std::result::Result<T, HffsError>;
