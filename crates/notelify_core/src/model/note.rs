//! Note domain model and wire-record normalization.
//!
//! # Responsibility
//! - Define the canonical `Note` record held by the sync cache.
//! - Define the raw `NoteDocument` shape pushed by the remote store.
//! - Define the partial shapes accepted by create (`NoteDraft`) and
//!   update (`NotePatch`).
//!
//! # Invariants
//! - `id` is assigned by the store and never changes.
//! - `owner_id` is set once at creation and never mutated.
//! - `updated_at >= created_at` holds for every normalized `Note`.
//! - A persisted title is never empty; it falls back to
//!   [`UNTITLED_NOTE_TITLE`].

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch milliseconds.
pub type EpochMillis = i64;

/// Placeholder title persisted when the caller supplies none.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled Note";

/// Opaque note identifier assigned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the authenticated user owning a set of notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One owned text note as seen by the cache and the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    /// Serialized as `userId` to match the remote collection.
    #[serde(rename = "userId")]
    pub owner_id: OwnerId,
    pub created_at: EpochMillis,
    pub updated_at: EpochMillis,
}

/// Raw record as pushed by the remote store.
///
/// Every field except identity and owner may be missing; see
/// [`NoteDocument::into_note`] for the defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDocument {
    pub id: NoteId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    pub user_id: OwnerId,
    #[serde(default)]
    pub created_at: Option<EpochMillis>,
    #[serde(default)]
    pub updated_at: Option<EpochMillis>,
}

impl NoteDocument {
    /// Normalizes one raw record into a cache entry.
    ///
    /// Missing text fields become empty strings and missing timestamps
    /// become `now`, so a half-written server record never stalls the UI.
    pub fn into_note(self, now: EpochMillis) -> Note {
        let created_at = self.created_at.unwrap_or(now);
        let updated_at = self.updated_at.unwrap_or(now).max(created_at);
        Note {
            id: self.id,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            owner_id: self.user_id,
            created_at,
            updated_at,
        }
    }
}

impl From<&Note> for NoteDocument {
    fn from(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: Some(note.title.clone()),
            content: Some(note.content.clone()),
            user_id: note.owner_id.clone(),
            created_at: Some(note.created_at),
            updated_at: Some(note.updated_at),
        }
    }
}

/// Partial note accepted by the create path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
        }
    }

    /// Title to persist: empty or missing values use the placeholder.
    pub fn resolved_title(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => UNTITLED_NOTE_TITLE.to_string(),
        }
    }

    /// Content to persist: missing values become an empty string.
    pub fn resolved_content(&self) -> String {
        self.content.clone().unwrap_or_default()
    }
}

/// Partial note accepted by the update path.
///
/// Only `Some` fields are written; timestamps are always store-assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl NotePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none()
    }

    /// Merges the supplied fields into `note`, leaving everything else as is.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = self.title.as_ref() {
            note.title = title.clone();
        }
        if let Some(content) = self.content.as_ref() {
            note.content = content.clone();
        }
    }
}

/// Current local wall clock in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Returns a timestamp strictly greater than `previous`, preferring `now`.
pub fn advance_timestamp(previous: EpochMillis, now: EpochMillis) -> EpochMillis {
    now.max(previous.saturating_add(1))
}

/// Normalizes a pushed snapshot into cache order.
///
/// - Records owned by anyone other than `owner` are dropped.
/// - Duplicate ids keep their first occurrence.
/// - Output is stably sorted by `updated_at` descending.
pub fn normalize_snapshot(
    documents: Vec<NoteDocument>,
    owner: &OwnerId,
    now: EpochMillis,
) -> Vec<Note> {
    let mut seen = HashSet::with_capacity(documents.len());
    let mut foreign = 0usize;
    let mut notes = Vec::with_capacity(documents.len());
    for document in documents {
        if &document.user_id != owner {
            foreign += 1;
            continue;
        }
        if !seen.insert(document.id.clone()) {
            continue;
        }
        notes.push(document.into_note(now));
    }

    if foreign > 0 {
        warn!("event=snapshot_normalize module=model status=dropped foreign_records={foreign}");
    }

    notes.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, owner: &str, updated_at: Option<i64>) -> NoteDocument {
        NoteDocument {
            id: NoteId::from(id),
            title: Some(format!("title {id}")),
            content: None,
            user_id: OwnerId::from(owner),
            created_at: Some(10),
            updated_at,
        }
    }

    #[test]
    fn into_note_defaults_missing_fields() {
        let raw = NoteDocument {
            id: NoteId::from("n1"),
            title: None,
            content: None,
            user_id: OwnerId::from("alice"),
            created_at: None,
            updated_at: None,
        };
        let note = raw.into_note(1_000);
        assert_eq!(note.title, "");
        assert_eq!(note.content, "");
        assert_eq!(note.created_at, 1_000);
        assert_eq!(note.updated_at, 1_000);
    }

    #[test]
    fn into_note_never_reports_update_before_creation() {
        let raw = NoteDocument {
            id: NoteId::from("n1"),
            title: None,
            content: None,
            user_id: OwnerId::from("alice"),
            created_at: Some(500),
            updated_at: None,
        };
        assert_eq!(raw.into_note(100).updated_at, 500);
    }

    #[test]
    fn draft_substitutes_placeholder_for_empty_title() {
        let draft = NoteDraft::new("", "Hello");
        assert_eq!(draft.resolved_title(), UNTITLED_NOTE_TITLE);
        assert_eq!(draft.resolved_content(), "Hello");
        assert_eq!(NoteDraft::default().resolved_content(), "");
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let mut note = document("n1", "alice", Some(20)).into_note(0);
        assert!(NotePatch::new().is_empty());
        let patch = NotePatch::new().content("x");
        assert!(!patch.is_empty());
        patch.apply_to(&mut note);
        assert_eq!(note.title, "title n1");
        assert_eq!(note.content, "x");
        assert_eq!(note.created_at, 10);
    }

    #[test]
    fn advance_timestamp_is_strictly_increasing() {
        assert_eq!(advance_timestamp(100, 50), 101);
        assert_eq!(advance_timestamp(100, 100), 101);
        assert_eq!(advance_timestamp(100, 200), 200);
    }

    #[test]
    fn normalize_snapshot_filters_dedupes_and_orders() {
        let owner = OwnerId::from("alice");
        let notes = normalize_snapshot(
            vec![
                document("old", "alice", Some(20)),
                document("mallory", "mallory", Some(99)),
                document("new", "alice", Some(40)),
                document("old", "alice", Some(90)),
            ],
            &owner,
            0,
        );
        let ids: Vec<&str> = notes.iter().map(|note| note.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(notes[1].updated_at, 20);
    }
}
