//! Sync state shown to callers.

use std::fmt;

use serde::Serialize;

/// Coarse sync indicator for an offline banner or status line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Offline,
    Syncing,
    /// Online with queued changes waiting for the next pass
    Pending,
    Synced,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}
