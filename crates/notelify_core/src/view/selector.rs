//! Pure selectors from the cache to presentation shapes.
//!
//! # Invariants
//! - Selectors never mutate their input and keep cache order.
//! - Search is a case-insensitive substring match over title and content;
//!   an empty query matches everything.

use crate::model::note::{EpochMillis, Note, NoteId, UNTITLED_NOTE_TITLE};
use once_cell::sync::Lazy;
use regex::Regex;

const PREVIEW_MAX_CHARS: usize = 100;
const EMPTY_PREVIEW: &str = "No content";
const NO_NOTES_MESSAGE: &str = "No notes found";
const SEARCH_HINT: &str = "Try a different search term";

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Notes whose title or content contains `query`, ignoring case.
pub fn filter_notes(notes: &[Note], query: &str) -> Vec<Note> {
    let needle = query.to_lowercase();
    notes
        .iter()
        .filter(|note| matches_query(note, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lowercase.
fn matches_query(note: &Note, needle: &str) -> bool {
    needle.is_empty()
        || note.title.to_lowercase().contains(needle)
        || note.content.to_lowercase().contains(needle)
}

pub fn find_note<'a>(notes: &'a [Note], id: &NoteId) -> Option<&'a Note> {
    notes.iter().find(|note| &note.id == id)
}

/// One sidebar row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListItem {
    pub id: NoteId,
    pub title: String,
    pub preview: String,
    pub age_label: String,
}

impl NoteListItem {
    pub fn from_note(note: &Note, now: EpochMillis) -> Self {
        let title = if note.title.is_empty() {
            UNTITLED_NOTE_TITLE.to_string()
        } else {
            note.title.clone()
        };
        Self {
            id: note.id.clone(),
            title,
            preview: derive_preview(&note.content),
            age_label: format!("Edited {}", describe_age(note.updated_at, now)),
        }
    }
}

/// Filtered sidebar contents plus the empty-state copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteListView {
    pub items: Vec<NoteListItem>,
    /// Set only when `items` is empty.
    pub empty_message: Option<&'static str>,
    /// Set only when a non-empty query matched nothing.
    pub search_hint: Option<&'static str>,
}

impl NoteListView {
    pub fn build(notes: &[Note], query: &str, now: EpochMillis) -> Self {
        let items: Vec<NoteListItem> = filter_notes(notes, query)
            .iter()
            .map(|note| NoteListItem::from_note(note, now))
            .collect();
        let is_empty = items.is_empty();
        Self {
            items,
            empty_message: is_empty.then_some(NO_NOTES_MESSAGE),
            search_hint: (is_empty && !query.is_empty()).then_some(SEARCH_HINT),
        }
    }
}

/// Plain-text preview: markup tags stripped, whitespace collapsed, capped.
pub fn derive_preview(content: &str) -> String {
    let without_tags = MARKUP_TAG_RE.replace_all(content, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_tags, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        EMPTY_PREVIEW.to_string()
    } else {
        trimmed.chars().take(PREVIEW_MAX_CHARS).collect()
    }
}

/// Coarse human distance between two timestamps, e.g. `5 minutes`.
pub fn describe_age(then: EpochMillis, now: EpochMillis) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let seconds = (now - then).max(0) / 1000;
    let (count, unit, approximate) = match seconds {
        s if s < MINUTE => return "less than a minute".to_string(),
        s if s < HOUR => (s / MINUTE, "minute", false),
        s if s < DAY => (s / HOUR, "hour", true),
        s if s < MONTH => (s / DAY, "day", false),
        s if s < YEAR => (s / MONTH, "month", true),
        s => (s / YEAR, "year", true),
    };
    let plural = if count == 1 { "" } else { "s" };
    let prefix = if approximate && count == 1 { "about " } else { "" };
    format!("{prefix}{count} {unit}{plural}")
}

#[cfg(test)]
mod tests {
    use super::{derive_preview, describe_age};

    #[test]
    fn preview_strips_markup_and_falls_back() {
        assert_eq!(derive_preview("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(derive_preview("<br/>  "), "No content");
        assert_eq!(derive_preview(&"x".repeat(300)).len(), 100);
    }

    #[test]
    fn age_is_described_coarsely() {
        let minute = 60_000;
        assert_eq!(describe_age(0, 30_000), "less than a minute");
        assert_eq!(describe_age(0, minute), "1 minute");
        assert_eq!(describe_age(0, 5 * minute), "5 minutes");
        assert_eq!(describe_age(0, 60 * minute), "about 1 hour");
        assert_eq!(describe_age(0, 3 * 60 * minute), "3 hours");
        assert_eq!(describe_age(0, 48 * 60 * minute), "2 days");
        assert_eq!(describe_age(10, 0), "less than a minute");
    }
}
