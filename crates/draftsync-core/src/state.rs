//! Observable sync state shared with UI layers.

/// Status of a draft session's backend sync, derived from push outcomes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing pushed yet
    #[default]
    Idle,
    /// Connectivity is down; edits are saved locally and queued
    Offline,
    /// A push is in flight
    Syncing,
    /// The last push was acknowledged
    Synced,
    /// Online, but some snapshots are waiting in the retry queue
    Pending,
}

impl SyncState {
    /// Short label suitable for a status line.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Offline => "offline - saving locally",
            Self::Syncing => "syncing",
            Self::Synced => "saved",
            Self::Pending => "pending retry",
        }
    }
}
