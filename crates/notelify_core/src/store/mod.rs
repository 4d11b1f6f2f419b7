//! Remote note store capability.
//!
//! # Responsibility
//! - Define the contract the sync engine and mutation gateway rely on:
//!   a filtered, ordered snapshot stream plus create/update/delete by id.
//! - Keep transport and auth handshake details out of core logic.
//!
//! # Invariants
//! - A store handle is constructed explicitly and shared as
//!   `Arc<dyn NoteStore>`; nothing looks it up from process-wide state.
//! - Each `Subscription` runs its disposer at most once.
//! - A store delivers no event to a listener after its subscription is
//!   disposed.
//! - Writes are scoped to the acting owner: touching another owner's
//!   document is `Denied`, an unknown id is `NotFound`.

use crate::model::note::{NoteDocument, NoteId, NotePatch, OwnerId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub mod sqlite_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Tagged failure reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the caller (permissions, rules).
    Denied(String),
    /// The store could not be reached or could not complete the call.
    Unavailable(String),
    /// Target document does not exist.
    NotFound(NoteId),
    /// Anything the backend could not classify.
    Unknown(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied(detail) => write!(f, "permission denied: {detail}"),
            Self::Unavailable(detail) => write!(f, "store unavailable: {detail}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::Unknown(detail) => write!(f, "unknown store error: {detail}"),
        }
    }
}

impl Error for StoreError {}

impl StoreError {
    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Denied(_) => "denied",
            Self::Unavailable(_) => "unavailable",
            Self::NotFound(_) => "not_found",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Live query: equality filter on owner, ordered by `updatedAt` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteQuery {
    pub owner: OwnerId,
}

impl NoteQuery {
    pub fn owned_by(owner: OwnerId) -> Self {
        Self { owner }
    }

    pub fn matches(&self, document: &NoteDocument) -> bool {
        document.user_id == self.owner
    }
}

/// Create payload; both timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNoteDocument {
    pub title: String,
    pub content: String,
    pub user_id: OwnerId,
}

/// One push from a live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// Complete ordered contents for the subscribed query.
    Snapshot(Vec<NoteDocument>),
    /// The stream terminated abnormally; no further events follow.
    Error(StoreError),
}

/// Callback invoked by the store for every subscription event.
pub type SnapshotListener = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

/// Cancellable handle for one live subscription.
///
/// Dropping the handle disposes it as well.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Runs the disposer if it has not run yet.
    ///
    /// Returns `true` only for the call that actually detached the stream.
    pub fn dispose(&mut self) -> bool {
        match self.disposer.take() {
            Some(disposer) => {
                disposer();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Remote note store contract.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Opens a live subscription for `query`.
    ///
    /// The store may deliver the first snapshot before this call returns.
    fn subscribe(&self, query: NoteQuery, listener: SnapshotListener)
        -> StoreResult<Subscription>;
    /// Creates one document and returns its store-assigned id.
    async fn create(&self, document: NewNoteDocument) -> StoreResult<NoteId>;
    /// Writes the supplied fields plus a refreshed `updatedAt` on a document
    /// owned by `owner`.
    async fn update(&self, owner: &OwnerId, id: &NoteId, patch: &NotePatch) -> StoreResult<()>;
    /// Hard-deletes one document owned by `owner`.
    async fn delete(&self, owner: &OwnerId, id: &NoteId) -> StoreResult<()>;
}
