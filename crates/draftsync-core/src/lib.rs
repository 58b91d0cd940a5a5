//! draftsync-core - Draft autosave and multi-tab sync
//!
//! This crate keeps an in-progress form draft safe across reloads, crashes and
//! connectivity loss: every edit lands in local storage first, peer tabs are
//! told about it over a broadcast hub, and the backend receives debounced
//! partial updates with an offline retry queue.

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod debounce;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod resume;
pub mod session;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

pub use auth::{SharedToken, TokenProvider};
pub use broadcast::{BroadcastHub, MergeOutcome};
pub use config::DraftSyncConfig;
pub use error::{Error, Result};
pub use models::{Draft, OwnerId, TaskDomain};
pub use remote::{RemoteError, RemoteSyncClient};
pub use resume::LoadPhase;
pub use session::{DraftSession, DraftSessionBuilder};
pub use state::SyncState;
