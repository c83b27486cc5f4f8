use serde::{Deserialize, Serialize};

/// Where the tracked-coin synchronizer is in its per-session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// No signed-in user. Coins live in memory only.
    Unauthenticated,
    /// A user is known and the first snapshot is being fetched.
    Loading,
    /// The tracked set mirrors the store and a subscription is live.
    Synced,
    /// The last fetch or subscription failed; the tracked set is empty.
    Error,
}

impl SyncStatus {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, SyncStatus::Unauthenticated)
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Unauthenticated => write!(f, "Unauthenticated"),
            SyncStatus::Loading => write!(f, "Loading"),
            SyncStatus::Synced => write!(f, "Synced"),
            SyncStatus::Error => write!(f, "Error"),
        }
    }
}
