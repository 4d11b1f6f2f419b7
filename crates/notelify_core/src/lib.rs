//! Core domain logic for Notelify.
//! Owns the per-owner notes cache and every rule about keeping it in sync
//! with the document store.

pub mod auth;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;
pub mod view;

pub use auth::gate::{AuthGate, AuthTransition};
pub use config::CoreConfig;
pub use db::{DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::note::{
    Note, NoteDocument, NoteDraft, NoteId, NotePatch, OwnerId, UNTITLED_NOTE_TITLE,
};
pub use service::editor::{
    DeleteOutcome, EditorController, EditorError, EditorTarget, SaveOutcome,
    DELETE_CONFIRMATION_PROMPT,
};
pub use service::mutation_gateway::{MutationGateway, NotesError, NotesResult};
pub use service::notes_session::NotesSession;
pub use store::sqlite_store::SqliteNoteStore;
pub use store::{
    NewNoteDocument, NoteQuery, NoteStore, SnapshotListener, StoreError, StoreResult,
    Subscription, SubscriptionEvent,
};
pub use sync::cache::{NoteCache, SessionToken, SyncPhase, SyncStatus};
pub use sync::engine::{SyncEngine, SyncError};
pub use view::selector::{filter_notes, find_note, NoteListItem, NoteListView};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
