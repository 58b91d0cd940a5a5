//! Draft model and its persisted JSON layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::domain::OwnerId;
use crate::error::Error;

/// Layout version written into every persisted draft
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// One answered (or partially answered) form field.
///
/// Serialized as a two-element array `[prompt, answer]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct FieldEntry {
    /// Question text, kept so a restored draft can redisplay it
    pub prompt: String,
    /// The user's answer
    pub answer: String,
}

impl FieldEntry {
    #[must_use]
    pub fn new(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            answer: answer.into(),
        }
    }

    /// Whitespace-only answers count as unanswered
    #[must_use]
    pub fn has_answer(&self) -> bool {
        !self.answer.trim().is_empty()
    }
}

impl From<(String, String)> for FieldEntry {
    fn from((prompt, answer): (String, String)) -> Self {
        Self { prompt, answer }
    }
}

impl From<FieldEntry> for (String, String) {
    fn from(entry: FieldEntry) -> Self {
        (entry.prompt, entry.answer)
    }
}

/// Ordered set of selected category tags (insertion order, no duplicates).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet(Vec<String>);

impl CategorySet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|existing| existing == tag)
    }

    /// Add a tag; returns false if it was already selected
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    /// Remove a tag; returns false if it was not selected
    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != tag);
        self.0.len() != before
    }

    /// Flip a tag's selection; returns whether it is selected afterwards
    pub fn toggle(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.remove(&tag) {
            false
        } else {
            self.0.push(tag);
            true
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for CategorySet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(set: CategorySet) -> Self {
        set.0
    }
}

impl FromIterator<String> for CategorySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// In-progress, unsubmitted form state.
///
/// Deserialization goes through a normalization step that also accepts the
/// legacy layouts (`id`/`formData`/`subdomain` keys, `{"data": {...}}`
/// wrapping), so everything past the storage boundary sees this shape only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDraft")]
pub struct Draft {
    pub schema_version: u32,
    pub owner_id: OwnerId,
    pub form_fields: BTreeMap<String, FieldEntry>,
    pub selected_categories: CategorySet,
    /// Last local mutation (Unix ms)
    pub updated_at: i64,
    /// Logical clock; highest version wins across tabs
    pub version: u64,
}

impl Draft {
    /// Empty draft for `owner` at version 0
    #[must_use]
    pub fn new(owner: OwnerId) -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            owner_id: owner,
            form_fields: BTreeMap::new(),
            selected_categories: CategorySet::new(),
            updated_at: chrono::Utc::now().timestamp_millis(),
            version: 0,
        }
    }

    /// A draft with no fields and no categories is never offered for resume
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.form_fields.is_empty() || !self.selected_categories.is_empty()
    }

    #[must_use]
    pub fn belongs_to(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }

    #[must_use]
    pub fn answer(&self, field: &str) -> Option<&str> {
        self.form_fields.get(field).map(|entry| entry.answer.as_str())
    }

    /// Fields carrying a non-blank answer, in field-name order
    pub fn answered_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.form_fields
            .iter()
            .filter(|(_, entry)| entry.has_answer())
            .map(|(field, entry)| (field.as_str(), entry.answer.as_str()))
    }

    /// Set an answer. An empty `prompt` keeps the prompt already recorded.
    pub fn set_answer(&mut self, field: impl Into<String>, prompt: &str, answer: impl Into<String>) {
        let entry = self.form_fields.entry(field.into()).or_default();
        if !prompt.is_empty() {
            entry.prompt = prompt.to_string();
        }
        entry.answer = answer.into();
    }

    /// Advance the logical clock for a persisted mutation; returns the new version
    pub fn record_mutation(&mut self) -> u64 {
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
        self.version
    }

    /// Take over another draft's content and version wholesale
    pub fn adopt(&mut self, incoming: &Self) {
        self.form_fields = incoming.form_fields.clone();
        self.selected_categories = incoming.selected_categories.clone();
        self.version = incoming.version;
        self.updated_at = incoming.updated_at;
    }

    /// Drop fields and categories; the version is left untouched
    pub fn clear_content(&mut self) {
        self.form_fields.clear();
        self.selected_categories = CategorySet::new();
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default, alias = "id")]
    owner_id: Option<String>,
    #[serde(default, alias = "formData")]
    form_fields: Option<BTreeMap<String, FieldEntry>>,
    #[serde(default, alias = "subdomain")]
    selected_categories: Option<CategorySet>,
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    data: Option<Box<RawDraft>>,
}

impl TryFrom<RawDraft> for Draft {
    type Error = Error;

    fn try_from(raw: RawDraft) -> Result<Self, Self::Error> {
        if raw.owner_id.is_none() {
            if let Some(inner) = raw.data {
                return Self::try_from(*inner);
            }
        }

        let schema_version = raw.schema_version.unwrap_or(0);
        if schema_version > DRAFT_SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "unsupported draft schemaVersion {schema_version} (expected <= {DRAFT_SCHEMA_VERSION})"
            )));
        }

        let owner_id = raw
            .owner_id
            .ok_or_else(|| Error::InvalidInput("draft has no owner".to_string()))
            .and_then(OwnerId::new)?;

        Ok(Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            owner_id,
            form_fields: raw.form_fields.unwrap_or_default(),
            selected_categories: raw.selected_categories.unwrap_or_default(),
            updated_at: raw.updated_at.unwrap_or(0),
            version: raw.version.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn owner() -> OwnerId {
        OwnerId::new("u1").unwrap()
    }

    #[test]
    fn test_new_draft_has_no_content() {
        let draft = Draft::new(owner());
        assert!(!draft.has_content());
        assert_eq!(draft.version, 0);
        assert_eq!(draft.schema_version, DRAFT_SCHEMA_VERSION);
    }

    #[test]
    fn test_categories_alone_count_as_content() {
        let mut draft = Draft::new(owner());
        draft.selected_categories.insert("frontend");
        assert!(draft.has_content());
    }

    #[test]
    fn test_category_set_rejects_duplicates() {
        let mut set = CategorySet::new();
        assert!(set.insert("frontend"));
        assert!(!set.insert("frontend"));
        assert!(set.insert("backend"));
        assert_eq!(set.as_slice(), ["frontend", "backend"]);
    }

    #[test]
    fn test_category_toggle() {
        let mut set = CategorySet::new();
        assert!(set.toggle("ml"));
        assert!(set.contains("ml"));
        assert!(!set.toggle("ml"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_category_set_dedups_on_load() {
        let set: CategorySet = serde_json::from_str(r#"["cp","app","cp"]"#).unwrap();
        assert_eq!(set.as_slice(), ["cp", "app"]);
    }

    #[test]
    fn test_set_answer_keeps_existing_prompt() {
        let mut draft = Draft::new(owner());
        draft.set_answer("question1", "Why this club?", "first");
        draft.set_answer("question1", "", "second");
        assert_eq!(
            draft.form_fields["question1"],
            FieldEntry::new("Why this club?", "second")
        );
    }

    #[test]
    fn test_answered_fields_skips_blank_answers() {
        let mut draft = Draft::new(owner());
        draft.set_answer("question1", "", "yes");
        draft.set_answer("question2", "", "   ");
        let answered: Vec<_> = draft.answered_fields().collect();
        assert_eq!(answered, vec![("question1", "yes")]);
    }

    #[test]
    fn test_record_mutation_increments_version() {
        let mut draft = Draft::new(owner());
        assert_eq!(draft.record_mutation(), 1);
        assert_eq!(draft.record_mutation(), 2);
    }

    #[test]
    fn test_serialized_layout() {
        let mut draft = Draft::new(owner());
        draft.set_answer("question1", "", "draft answer");
        draft.updated_at = 42;
        draft.version = 1;

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "schemaVersion": 1,
                "ownerId": "u1",
                "formFields": {"question1": ["", "draft answer"]},
                "selectedCategories": [],
                "updatedAt": 42,
                "version": 1
            })
        );
    }

    #[test]
    fn test_legacy_layout_is_normalized() {
        let raw = r#"{
            "id": "u1",
            "formData": {"question2": ["Prompt", "Answer"]},
            "subdomain": ["frontend"],
            "updatedAt": 100,
            "version": 7
        }"#;
        let draft: Draft = serde_json::from_str(raw).unwrap();
        assert_eq!(draft.owner_id, owner());
        assert_eq!(draft.answer("question2"), Some("Answer"));
        assert_eq!(draft.selected_categories.as_slice(), ["frontend"]);
        assert_eq!(draft.version, 7);
        assert_eq!(draft.schema_version, DRAFT_SCHEMA_VERSION);
    }

    #[test]
    fn test_wrapped_layout_is_normalized() {
        let raw = r#"{"data": {"id": "u1", "formData": {}, "subdomain": []}}"#;
        let draft: Draft = serde_json::from_str(raw).unwrap();
        assert_eq!(draft.owner_id, owner());
        assert_eq!(draft.version, 0);
        assert!(!draft.has_content());
    }

    #[test]
    fn test_future_schema_is_rejected() {
        let raw = r#"{"schemaVersion": 9, "ownerId": "u1"}"#;
        assert!(serde_json::from_str::<Draft>(raw).is_err());
    }

    #[test]
    fn test_missing_owner_is_rejected() {
        assert!(serde_json::from_str::<Draft>(r#"{"formFields": {}}"#).is_err());
        assert!(serde_json::from_str::<Draft>(r#"{"ownerId": "  "}"#).is_err());
    }

    #[test]
    fn test_adopt_replaces_everything() {
        let mut local = Draft::new(owner());
        local.set_answer("question1", "", "mine");
        local.version = 3;

        let mut incoming = Draft::new(owner());
        incoming.selected_categories.insert("app");
        incoming.version = 5;

        local.adopt(&incoming);
        assert!(local.form_fields.is_empty());
        assert_eq!(local.selected_categories.as_slice(), ["app"]);
        assert_eq!(local.version, 5);
    }
}
