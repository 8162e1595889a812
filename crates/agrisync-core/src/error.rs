//! Error types for agrisync-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using agrisync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in agrisync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The local database could not be opened or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote service error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Whether this error came from the local storage layer.
    ///
    /// Storage failures are never fatal to callers: the optimistic record is
    /// still returned and the next operation retries implicitly.
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::LibSql(_) | Self::Io(_) | Self::StorageUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_classified() {
        assert!(Error::StorageUnavailable("quota exceeded".into()).is_storage_unavailable());
        assert!(Error::Database("locked".into()).is_storage_unavailable());
        assert!(!Error::InvalidInput("bad".into()).is_storage_unavailable());
        assert!(
            !Error::Remote(RemoteError::Unreachable("down".into())).is_storage_unavailable()
        );
    }
}
