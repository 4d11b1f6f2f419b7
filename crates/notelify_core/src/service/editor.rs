//! Single-note draft lifecycle.
//!
//! # Responsibility
//! - Hold the local-only title/content draft of a new or existing note.
//! - Route save/delete through the mutation gateway.
//! - Track `saving`/`deleting` flags for the UI.
//!
//! # Invariants
//! - Saving an all-blank draft performs no network call.
//! - In-flight flags are cleared on every exit path, including a dropped
//!   future.
//! - A failed save or delete leaves the draft unchanged.

use crate::model::note::{Note, NoteDraft, NoteId, NotePatch, UNTITLED_NOTE_TITLE};
use crate::service::mutation_gateway::{MutationGateway, NotesError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Question a host shows before calling [`EditorController::delete`].
pub const DELETE_CONFIRMATION_PROMPT: &str =
    "Are you sure you want to delete this note? This action cannot be undone.";

/// What the editor is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorTarget {
    New,
    Existing(NoteId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Title and content were both blank; nothing was sent.
    Skipped,
    /// Another save is still in flight.
    Busy,
    Created(NoteId),
    Updated(NoteId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(NoteId),
    /// The user declined the confirmation.
    Cancelled,
    /// The draft is not bound to an existing note.
    NoTarget,
    /// Another delete is still in flight.
    Busy,
}

/// User-visible editor failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    Save(NotesError),
    Delete(NotesError),
}

impl EditorError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Save(_) => "Failed to save note. Please try again.",
            Self::Delete(_) => "Failed to delete note. Please try again.",
        }
    }

    pub fn cause(&self) -> &NotesError {
        match self {
            Self::Save(err) | Self::Delete(err) => err,
        }
    }
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause())
    }
}

#[derive(Debug, Clone)]
struct DraftState {
    target: EditorTarget,
    title: String,
    content: String,
    seed_title: String,
    seed_content: String,
}

/// Resets an in-flight flag when dropped.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Draft controller for one editor pane.
pub struct EditorController {
    draft: Mutex<DraftState>,
    saving: AtomicBool,
    deleting: AtomicBool,
    last_error: Mutex<Option<EditorError>>,
}

impl EditorController {
    /// Blank draft for a note that does not exist yet.
    pub fn new_note() -> Self {
        Self::with_state(EditorTarget::New, String::new(), String::new())
    }

    /// Draft seeded from an existing note.
    pub fn for_note(note: &Note) -> Self {
        Self::with_state(
            EditorTarget::Existing(note.id.clone()),
            note.title.clone(),
            note.content.clone(),
        )
    }

    fn with_state(target: EditorTarget, title: String, content: String) -> Self {
        Self {
            draft: Mutex::new(DraftState {
                target,
                seed_title: title.clone(),
                seed_content: content.clone(),
                title,
                content,
            }),
            saving: AtomicBool::new(false),
            deleting: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn target(&self) -> EditorTarget {
        self.lock_draft().target.clone()
    }

    pub fn title(&self) -> String {
        self.lock_draft().title.clone()
    }

    pub fn content(&self) -> String {
        self.lock_draft().content.clone()
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.lock_draft().title = title.into();
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.lock_draft().content = content.into();
    }

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting.load(Ordering::SeqCst)
    }

    /// Whether the draft differs from what it was seeded (or last saved) with.
    pub fn is_dirty(&self) -> bool {
        let draft = self.lock_draft();
        draft.title != draft.seed_title || draft.content != draft.seed_content
    }

    /// Mirrors the Save button: disabled while saving or when blank.
    pub fn can_save(&self) -> bool {
        let draft = self.lock_draft();
        !self.is_saving() && !(draft.title.trim().is_empty() && draft.content.trim().is_empty())
    }

    /// Last user-visible error, cleared when the next attempt starts.
    pub fn last_error(&self) -> Option<EditorError> {
        self.lock_error().clone()
    }

    /// Persists the draft: creates for a new target, updates otherwise.
    ///
    /// Values are trimmed and an empty title becomes the Untitled
    /// placeholder. A successful create rebinds the editor to the new id.
    pub async fn save(&self, gateway: &MutationGateway) -> Result<SaveOutcome, EditorError> {
        let snapshot = self.lock_draft().clone();
        let title = snapshot.title.trim();
        let content = snapshot.content.trim();
        if title.is_empty() && content.is_empty() {
            return Ok(SaveOutcome::Skipped);
        }

        let Some(_saving) = FlagGuard::raise(&self.saving) else {
            return Ok(SaveOutcome::Busy);
        };
        *self.lock_error() = None;

        let title = if title.is_empty() {
            UNTITLED_NOTE_TITLE
        } else {
            title
        };
        let result = match &snapshot.target {
            EditorTarget::New => gateway
                .add_note(NoteDraft::new(title, content))
                .await
                .map(SaveOutcome::Created),
            EditorTarget::Existing(id) => gateway
                .update_note(id, NotePatch::new().title(title).content(content))
                .await
                .map(|()| SaveOutcome::Updated(id.clone())),
        };

        match result {
            Ok(outcome) => {
                let mut draft = self.lock_draft();
                if let SaveOutcome::Created(id) = &outcome {
                    draft.target = EditorTarget::Existing(id.clone());
                }
                draft.seed_title = snapshot.title;
                draft.seed_content = snapshot.content;
                info!("event=editor_save module=editor status=ok outcome={outcome:?}");
                Ok(outcome)
            }
            Err(err) => Err(self.record_failure(EditorError::Save(err))),
        }
    }

    /// Deletes the bound note after `confirm` approves it.
    ///
    /// `confirm` receives the note id and current draft title. A declined
    /// confirmation performs no network call.
    pub async fn delete(
        &self,
        gateway: &MutationGateway,
        confirm: impl FnOnce(&NoteId, &str) -> bool,
    ) -> Result<DeleteOutcome, EditorError> {
        let (target, title) = {
            let draft = self.lock_draft();
            (draft.target.clone(), draft.title.clone())
        };
        let EditorTarget::Existing(id) = target else {
            return Ok(DeleteOutcome::NoTarget);
        };
        if !confirm(&id, &title) {
            info!("event=editor_delete module=editor status=cancelled note_id={id}");
            return Ok(DeleteOutcome::Cancelled);
        }

        let Some(_deleting) = FlagGuard::raise(&self.deleting) else {
            return Ok(DeleteOutcome::Busy);
        };
        *self.lock_error() = None;

        match gateway.delete_note(&id).await {
            Ok(()) => {
                info!("event=editor_delete module=editor status=ok note_id={id}");
                Ok(DeleteOutcome::Deleted(id))
            }
            Err(err) => Err(self.record_failure(EditorError::Delete(err))),
        }
    }

    fn record_failure(&self, failure: EditorError) -> EditorError {
        error!(
            "event=editor_failure module=editor status=error error={}",
            failure.cause()
        );
        *self.lock_error() = Some(failure.clone());
        failure
    }

    fn lock_draft(&self) -> MutexGuard<'_, DraftState> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<EditorError>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
