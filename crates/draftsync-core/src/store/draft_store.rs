//! Local draft store

use std::sync::Arc;

use super::kv::KeyValueStore;
use crate::models::{draft_key, Draft, OwnerId, TabId, TaskDomain};

/// Session-scoped entry holding the tab id as a plain string
pub const TAB_ID_KEY: &str = "tabId";

/// Persists one form's draft under `"{domain}_draft_{owner}"`.
///
/// Every operation is infallible from the caller's side: storage and parse
/// failures are logged and the in-memory draft stays authoritative. Without
/// an owner the store has no key and does nothing.
#[derive(Clone)]
pub struct DraftStore {
    kv: Arc<dyn KeyValueStore>,
    key: Option<String>,
}

impl DraftStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, domain: TaskDomain, owner: Option<&OwnerId>) -> Self {
        Self {
            kv,
            key: owner.map(|owner| draft_key(domain, owner)),
        }
    }

    /// Storage key, `None` while the owner is unknown
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Write the draft; returns whether it was persisted
    pub fn save(&self, draft: &Draft) -> bool {
        let Some(key) = self.key() else {
            return false;
        };

        let serialized = match serde_json::to_string(draft) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::error!(draft_key = key, "Failed to serialize draft: {}", error);
                return false;
            }
        };

        match self.kv.set(key, &serialized) {
            Ok(()) => {
                tracing::debug!(draft_key = key, version = draft.version, "Draft saved");
                true
            }
            Err(error) => {
                tracing::error!(draft_key = key, "Failed to save draft: {}", error);
                false
            }
        }
    }

    /// Stored draft, or `None` when absent or unreadable
    pub fn load(&self) -> Option<Draft> {
        let key = self.key()?;
        let raw = match self.kv.get(key) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::error!(draft_key = key, "Failed to read draft: {}", error);
                return None;
            }
        };

        match serde_json::from_str::<Draft>(&raw) {
            Ok(draft) => Some(draft),
            Err(error) => {
                tracing::warn!(draft_key = key, "Ignoring malformed stored draft: {}", error);
                None
            }
        }
    }

    /// Remove the stored draft (idempotent)
    pub fn clear(&self) {
        let Some(key) = self.key() else {
            return;
        };
        if let Err(error) = self.kv.remove(key) {
            tracing::error!(draft_key = key, "Failed to clear draft: {}", error);
        } else {
            tracing::debug!(draft_key = key, "Draft cleared");
        }
    }
}

/// Tab id stored in session-scoped storage, created on first use.
///
/// A storage failure still yields a usable (unpersisted) id.
pub fn session_tab_id(session: &dyn KeyValueStore) -> TabId {
    match session.get(TAB_ID_KEY) {
        Ok(Some(raw)) => {
            if let Some(id) = TabId::from_stored(&raw) {
                return id;
            }
        }
        Ok(None) => {}
        Err(error) => tracing::warn!("Failed to read tab id: {}", error),
    }

    let id = TabId::generate();
    if let Err(error) = session.set(TAB_ID_KEY, id.as_str()) {
        tracing::warn!("Failed to persist tab id: {}", error);
    }
    id
}
