use std::io;

use agrisync_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] agrisync_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0} cannot be changed from the command line")]
    ReadOnlyCollection(String),
    #[error(
        "No remote service configured. Pass --api-url, set AGRISYNC_API_URL, or run `agrisync config set --api-url <URL>`."
    )]
    RemoteNotConfigured,
}
