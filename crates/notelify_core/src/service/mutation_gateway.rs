//! Create/update/delete against the store with post-confirmation overlays.
//!
//! # Responsibility
//! - Reject mutations without an authenticated owner before any network
//!   call.
//! - Forward writes to the store and map its errors to `NotesError`.
//! - Apply an optimistic cache effect only after the store confirmed the
//!   write.
//!
//! # Invariants
//! - A failed write leaves the cache exactly as it was.
//! - An effect is applied only while the session that issued the write is
//!   still current (same owner, same subscription epoch).
//! - Effects are idempotent against a snapshot that already carries the
//!   write: add never duplicates an id, update and delete are no-ops for
//!   missing ids.

use crate::auth::gate::AuthGate;
use crate::model::note::{
    advance_timestamp, now_millis, EpochMillis, Note, NoteDraft, NoteId, NotePatch, OwnerId,
};
use crate::store::{NewNoteDocument, NoteStore, StoreError};
use crate::sync::cache::NoteCache;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Mutation failure reported to the triggering UI action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotesError {
    /// No owner is authenticated; nothing was sent.
    Unauthenticated,
    /// The store rejected the write.
    Denied(String),
    /// The store could not complete the write.
    Unavailable(String),
    /// Target note does not exist remotely.
    NotFound(NoteId),
    /// Unclassified store failure.
    Unknown(String),
}

impl Display for NotesError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "user not authenticated"),
            Self::Denied(detail) => write!(f, "permission denied: {detail}"),
            Self::Unavailable(detail) => write!(f, "store unavailable: {detail}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Unknown(detail) => write!(f, "unknown error: {detail}"),
        }
    }
}

impl Error for NotesError {}

impl From<StoreError> for NotesError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Denied(detail) => Self::Denied(detail),
            StoreError::Unavailable(detail) => Self::Unavailable(detail),
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Unknown(detail) => Self::Unknown(detail),
        }
    }
}

pub type NotesResult<T> = Result<T, NotesError>;

/// Write path into the remote store plus its optimistic cache effects.
pub struct MutationGateway {
    store: Arc<dyn NoteStore>,
    auth: Arc<AuthGate>,
    cache: Arc<NoteCache>,
}

impl MutationGateway {
    pub fn new(store: Arc<dyn NoteStore>, auth: Arc<AuthGate>, cache: Arc<NoteCache>) -> Self {
        Self { store, auth, cache }
    }

    /// Creates a note and returns its store-assigned id.
    ///
    /// Empty or missing titles persist as the Untitled placeholder.
    pub async fn add_note(&self, draft: NoteDraft) -> NotesResult<NoteId> {
        let owner = self.require_owner("add")?;
        let token = self.cache.session_token(&owner);
        let document = NewNoteDocument {
            title: draft.resolved_title(),
            content: draft.resolved_content(),
            user_id: owner.clone(),
        };
        info!("event=note_add module=mutation status=start owner={owner}");

        let id = match self.store.create(document.clone()).await {
            Ok(id) => id,
            Err(err) => return Err(log_failure("note_add", &owner, None, err)),
        };

        let applied = token.is_some_and(|token| {
            let now = now_millis();
            let note = Note {
                id: id.clone(),
                title: document.title,
                content: document.content,
                owner_id: owner.clone(),
                created_at: now,
                updated_at: now,
            };
            self.cache
                .apply_overlay(&token, |notes| prepend_if_absent(notes, note))
        });
        info!("event=note_add module=mutation status=ok owner={owner} note_id={id} overlay={applied}");
        Ok(id)
    }

    /// Writes the supplied fields of `patch` plus a fresh `updatedAt`.
    pub async fn update_note(&self, id: &NoteId, patch: NotePatch) -> NotesResult<()> {
        let owner = self.require_owner("update")?;
        let token = self.cache.session_token(&owner);
        info!("event=note_update module=mutation status=start owner={owner} note_id={id}");

        if let Err(err) = self.store.update(&owner, id, &patch).await {
            return Err(log_failure("note_update", &owner, Some(id), err));
        }

        let applied = token.is_some_and(|token| {
            self.cache.apply_overlay(&token, |notes| {
                merge_patch(notes, id, &patch, now_millis())
            })
        });
        info!("event=note_update module=mutation status=ok owner={owner} note_id={id} overlay={applied}");
        Ok(())
    }

    /// Hard-deletes a note.
    pub async fn delete_note(&self, id: &NoteId) -> NotesResult<()> {
        let owner = self.require_owner("delete")?;
        let token = self.cache.session_token(&owner);
        info!("event=note_delete module=mutation status=start owner={owner} note_id={id}");

        if let Err(err) = self.store.delete(&owner, id).await {
            return Err(log_failure("note_delete", &owner, Some(id), err));
        }

        let applied = token.is_some_and(|token| {
            self.cache
                .apply_overlay(&token, |notes| remove_note(notes, id))
        });
        info!("event=note_delete module=mutation status=ok owner={owner} note_id={id} overlay={applied}");
        Ok(())
    }

    fn require_owner(&self, operation: &'static str) -> NotesResult<OwnerId> {
        self.auth.current_owner().ok_or_else(|| {
            error!(
                "event=note_{operation} module=mutation status=error error_code=unauthenticated"
            );
            NotesError::Unauthenticated
        })
    }
}

fn log_failure(event: &str, owner: &OwnerId, id: Option<&NoteId>, err: StoreError) -> NotesError {
    let note_id = id.map_or_else(|| "-".to_string(), NoteId::to_string);
    error!(
        "event={event} module=mutation status=error owner={owner} note_id={note_id} error_code={} error={err}",
        err.code()
    );
    err.into()
}

fn prepend_if_absent(notes: &mut Vec<Note>, note: Note) -> bool {
    if notes.iter().any(|existing| existing.id == note.id) {
        return false;
    }
    notes.insert(0, note);
    true
}

fn merge_patch(notes: &mut Vec<Note>, id: &NoteId, patch: &NotePatch, now: EpochMillis) -> bool {
    let Some(index) = notes.iter().position(|note| &note.id == id) else {
        return false;
    };
    let mut note = notes.remove(index);
    patch.apply_to(&mut note);
    note.updated_at = advance_timestamp(note.updated_at, now);
    // Freshest entry leads the descending order.
    notes.insert(0, note);
    true
}

fn remove_note(notes: &mut Vec<Note>, id: &NoteId) -> bool {
    let before = notes.len();
    notes.retain(|note| &note.id != id);
    notes.len() != before
}
