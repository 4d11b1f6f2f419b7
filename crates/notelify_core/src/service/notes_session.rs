//! Consumer-facing notes surface.
//!
//! # Responsibility
//! - Wire `AuthGate`, `SyncEngine` and `MutationGateway` around one shared
//!   cache and one store handle.
//! - Translate auth transitions into sync engine hard resets.
//! - Expose `notes`, `loading`, the three mutations, and local search.

use crate::auth::gate::{AuthGate, AuthTransition};
use crate::model::note::{now_millis, Note, NoteDraft, NoteId, NotePatch, OwnerId};
use crate::service::mutation_gateway::{MutationGateway, NotesResult};
use crate::store::NoteStore;
use crate::sync::cache::{NoteCache, SyncStatus};
use crate::sync::engine::SyncEngine;
use crate::view::selector::{filter_notes, find_note, NoteListView};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// One live notes session bound to an auth gate and a store handle.
pub struct NotesSession {
    auth: Arc<AuthGate>,
    cache: Arc<NoteCache>,
    engine: SyncEngine,
    gateway: MutationGateway,
}

impl NotesSession {
    /// Builds the session and syncs it with the gate's current owner.
    pub fn new(store: Arc<dyn NoteStore>, auth: Arc<AuthGate>) -> Self {
        let cache = Arc::new(NoteCache::new());
        let engine = SyncEngine::new(Arc::clone(&store), Arc::clone(&cache));
        let gateway = MutationGateway::new(store, Arc::clone(&auth), Arc::clone(&cache));
        let session = Self {
            auth,
            cache,
            engine,
            gateway,
        };
        session.sync_with_auth();
        session
    }

    pub fn auth(&self) -> &Arc<AuthGate> {
        &self.auth
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn gateway(&self) -> &MutationGateway {
        &self.gateway
    }

    /// Ordered notes of the current owner.
    pub fn notes(&self) -> Vec<Note> {
        self.cache.notes()
    }

    pub fn loading(&self) -> bool {
        self.cache.loading()
    }

    pub fn status(&self) -> SyncStatus {
        self.cache.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.cache.watch_status()
    }

    pub fn note(&self, id: &NoteId) -> Option<Note> {
        find_note(&self.cache.notes(), id).cloned()
    }

    /// Case-insensitive search over title and content.
    pub fn search(&self, query: &str) -> Vec<Note> {
        filter_notes(&self.cache.notes(), query)
    }

    /// List projection for the sidebar.
    pub fn list_view(&self, query: &str) -> NoteListView {
        NoteListView::build(&self.cache.notes(), query, now_millis())
    }

    pub async fn add_note(&self, draft: NoteDraft) -> NotesResult<NoteId> {
        self.gateway.add_note(draft).await
    }

    pub async fn update_note(&self, id: &NoteId, patch: NotePatch) -> NotesResult<()> {
        self.gateway.update_note(id, patch).await
    }

    pub async fn delete_note(&self, id: &NoteId) -> NotesResult<()> {
        self.gateway.delete_note(id).await
    }

    /// Logs `owner` in and applies the resulting transitions.
    pub fn login(&self, owner: OwnerId) {
        for transition in self.auth.login(owner) {
            self.handle_transition(&transition);
        }
    }

    /// Logs out and tears the sync engine down.
    pub fn logout(&self) {
        if let Some(transition) = self.auth.logout() {
            self.handle_transition(&transition);
        }
    }

    /// Applies one auth transition to the sync engine.
    ///
    /// A login for the owner the engine already serves is a no-op.
    pub fn handle_transition(&self, transition: &AuthTransition) {
        match transition {
            AuthTransition::LoggedIn(owner) => {
                if self.cache.owner().as_ref() == Some(owner) && self.engine.is_subscribed() {
                    return;
                }
                info!("event=session_login module=session status=ok owner={owner}");
                self.engine.activate(Some(owner.clone()));
            }
            AuthTransition::LoggedOut => {
                info!("event=session_logout module=session status=ok");
                self.engine.teardown();
            }
        }
    }

    /// Re-aligns the engine with the gate's current owner.
    pub fn sync_with_auth(&self) {
        match self.auth.current_owner() {
            Some(owner) => self.handle_transition(&AuthTransition::LoggedIn(owner)),
            None if self.cache.owner().is_some() => {
                self.handle_transition(&AuthTransition::LoggedOut)
            }
            None => {}
        }
    }

    /// Applies transitions from `transitions` until its sender closes.
    pub async fn follow_auth(&self, mut transitions: broadcast::Receiver<AuthTransition>) {
        loop {
            match transitions.recv().await {
                Ok(transition) => self.handle_transition(&transition),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("event=session_follow module=session status=lagged skipped={skipped}");
                    self.sync_with_auth();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
