//! In-memory note cache owned by the sync engine.
//!
//! # Responsibility
//! - Hold the ordered notes of the current owner and the sync phase.
//! - Gate every write on the subscription epoch so stale callbacks are
//!   discarded.
//! - Publish a `SyncStatus` on every change.
//!
//! # Invariants
//! - Each write runs to completion under one lock; no partial update is
//!   ever observable.
//! - `reset` and `restart` bump the epoch; a snapshot, stream error or
//!   overlay stamped with an older epoch is dropped.
//! - Notes are empty whenever no owner is active.
//! - `revision` strictly increases with every published change.

use crate::model::note::{Note, OwnerId};
use crate::sync::engine::SyncError;
use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Lifecycle of the live subscription backing the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No owner; nothing subscribed.
    Idle,
    /// Subscription open, first snapshot not yet received.
    Subscribing,
    /// At least one snapshot applied; later snapshots replace the cache.
    Live,
    /// The stream failed; the last-known notes remain as a best-effort view.
    Failed,
}

/// Observable summary of the cache for UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub loading: bool,
    pub revision: u64,
    pub fatal_error: Option<SyncError>,
}

/// Identity of the session a mutation was issued in.
///
/// Captured before a remote call; the optimistic effect is applied only
/// while the same owner and subscription epoch are still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    owner: OwnerId,
    epoch: u64,
}

impl SessionToken {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

struct CacheState {
    owner: Option<OwnerId>,
    epoch: u64,
    phase: SyncPhase,
    notes: Vec<Note>,
    fatal_error: Option<SyncError>,
    revision: u64,
}

impl CacheState {
    fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.phase,
            loading: self.phase == SyncPhase::Subscribing,
            revision: self.revision,
            fatal_error: self.fatal_error.clone(),
        }
    }
}

/// Shared cache handle; cloned as `Arc<NoteCache>` into listeners.
pub struct NoteCache {
    state: Mutex<CacheState>,
    status: watch::Sender<SyncStatus>,
}

impl Default for NoteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteCache {
    pub fn new() -> Self {
        let state = CacheState {
            owner: None,
            epoch: 0,
            phase: SyncPhase::Idle,
            notes: Vec::new(),
            fatal_error: None,
            revision: 0,
        };
        let (status, _) = watch::channel(state.status());
        Self {
            state: Mutex::new(state),
            status,
        }
    }

    /// Ordered copy of the cached notes.
    pub fn notes(&self) -> Vec<Note> {
        self.lock().notes.clone()
    }

    pub fn loading(&self) -> bool {
        self.lock().phase == SyncPhase::Subscribing
    }

    pub fn phase(&self) -> SyncPhase {
        self.lock().phase
    }

    pub fn owner(&self) -> Option<OwnerId> {
        self.lock().owner.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn fatal_error(&self) -> Option<SyncError> {
        self.lock().fatal_error.clone()
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().status()
    }

    /// Watches status changes; the receiver sees the latest value only.
    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Token for mutations issued by `owner`, if the cache belongs to them.
    pub fn session_token(&self, owner: &OwnerId) -> Option<SessionToken> {
        let state = self.lock();
        match state.owner.as_ref() {
            Some(current) if current == owner && state.phase != SyncPhase::Idle => {
                Some(SessionToken {
                    owner: owner.clone(),
                    epoch: state.epoch,
                })
            }
            _ => None,
        }
    }

    /// Hard reset for an identity change; returns the new epoch.
    ///
    /// Clears all notes. With an owner the phase becomes `Subscribing`,
    /// otherwise `Idle`.
    pub(crate) fn reset(&self, owner: Option<OwnerId>) -> u64 {
        let mut state = self.lock();
        state.epoch += 1;
        state.phase = if owner.is_some() {
            SyncPhase::Subscribing
        } else {
            SyncPhase::Idle
        };
        state.owner = owner;
        state.notes.clear();
        state.fatal_error = None;
        self.publish(&mut state);
        state.epoch
    }

    /// Starts a fresh epoch for the same owner, keeping last-known notes.
    pub(crate) fn restart(&self) -> Option<(OwnerId, u64)> {
        let mut state = self.lock();
        let owner = state.owner.clone()?;
        state.epoch += 1;
        state.phase = SyncPhase::Subscribing;
        state.fatal_error = None;
        self.publish(&mut state);
        Some((owner, state.epoch))
    }

    /// Replaces the whole cache with a normalized snapshot.
    ///
    /// Returns `false` when the snapshot belongs to a superseded epoch.
    pub(crate) fn apply_snapshot(&self, epoch: u64, notes: Vec<Note>) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || !matches!(state.phase, SyncPhase::Subscribing | SyncPhase::Live)
        {
            debug!(
                "event=cache_snapshot module=sync status=discarded epoch={epoch} current_epoch={}",
                state.epoch
            );
            return false;
        }
        state.notes = notes;
        state.phase = SyncPhase::Live;
        self.publish(&mut state);
        true
    }

    /// Records a fatal stream error; notes are left untouched.
    pub(crate) fn apply_stream_error(&self, epoch: u64, error: SyncError) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || state.phase == SyncPhase::Idle {
            debug!(
                "event=cache_stream_error module=sync status=discarded epoch={epoch} current_epoch={}",
                state.epoch
            );
            return false;
        }
        state.phase = SyncPhase::Failed;
        state.fatal_error = Some(error);
        self.publish(&mut state);
        true
    }

    /// Applies an optimistic effect if `token` is still current.
    ///
    /// `effect` returns whether it changed anything; unchanged effects do
    /// not publish a new revision.
    pub(crate) fn apply_overlay(
        &self,
        token: &SessionToken,
        effect: impl FnOnce(&mut Vec<Note>) -> bool,
    ) -> bool {
        let mut state = self.lock();
        if state.epoch != token.epoch || state.owner.as_ref() != Some(&token.owner) {
            debug!(
                "event=cache_overlay module=sync status=discarded epoch={} current_epoch={}",
                token.epoch, state.epoch
            );
            return false;
        }
        let changed = effect(&mut state.notes);
        if changed {
            self.publish(&mut state);
        }
        changed
    }

    fn publish(&self, state: &mut CacheState) {
        state.revision += 1;
        self.status.send_replace(state.status());
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
