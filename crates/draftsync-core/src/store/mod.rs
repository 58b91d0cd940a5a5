//! Local persistence for drafts and tab identity

mod draft_store;
mod kv;
mod migrations;
mod sqlite;

pub use draft_store::{session_tab_id, DraftStore, TAB_ID_KEY};
pub use kv::{KeyValueStore, MemoryKeyValueStore};
pub use sqlite::SqliteKeyValueStore;
