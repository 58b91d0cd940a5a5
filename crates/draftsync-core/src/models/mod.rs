//! Data models for draftsync

mod domain;
mod draft;
mod tab;

pub use domain::{draft_key, OwnerId, TaskDomain};
pub use draft::{CategorySet, Draft, FieldEntry, DRAFT_SCHEMA_VERSION};
pub use tab::TabId;
