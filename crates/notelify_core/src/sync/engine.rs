//! Live subscription owner for the current user's notes.
//!
//! # Responsibility
//! - Open exactly one store subscription per active owner, filtered by
//!   owner and ordered by `updatedAt` descending.
//! - Replace the whole cache on every pushed snapshot.
//! - Tear the subscription down on logout, identity change, or drop.
//!
//! # Invariants
//! - The cache epoch is bumped before the old subscription is disposed, so
//!   a callback already queued by the store is discarded, not applied.
//! - Teardown is idempotent; the disposer of a subscription runs once.
//! - Stream failures are not retried here; `resubscribe` is the explicit
//!   recovery path.

use crate::model::note::{normalize_snapshot, now_millis, OwnerId};
use crate::store::{
    NoteQuery, NoteStore, SnapshotListener, StoreError, Subscription, SubscriptionEvent,
};
use crate::sync::cache::NoteCache;
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fatal synchronization failure surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The stream could not be opened at all.
    SubscribeFailed(StoreError),
    /// The stream terminated abnormally after opening.
    SubscriptionBroken(StoreError),
}

impl SyncError {
    /// Message suitable for direct display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SubscribeFailed(_) => {
                "Error setting up note synchronization. Please refresh the page."
            }
            Self::SubscriptionBroken(_) => "Error loading notes. Please refresh the page.",
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SubscribeFailed(err) => write!(f, "failed to open note subscription: {err}"),
            Self::SubscriptionBroken(err) => write!(f, "note subscription broken: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscribeFailed(err) | Self::SubscriptionBroken(err) => Some(err),
        }
    }
}

/// Owns the live subscription and feeds the shared cache.
pub struct SyncEngine {
    store: Arc<dyn NoteStore>,
    cache: Arc<NoteCache>,
    subscription: Mutex<Option<Subscription>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn NoteStore>, cache: Arc<NoteCache>) -> Self {
        Self {
            store,
            cache,
            subscription: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<NoteCache> {
        &self.cache
    }

    /// Whether a subscription handle is currently held.
    pub fn is_subscribed(&self) -> bool {
        self.lock_subscription()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Hard reset to `owner`: tears down, clears, and resubscribes.
    ///
    /// With `None` the engine ends `Idle` with `loading == false`.
    pub fn activate(&self, owner: Option<OwnerId>) {
        let epoch = self.cache.reset(owner.clone());
        self.detach();
        match owner {
            Some(owner) => self.open_stream(owner, epoch),
            None => info!("event=sync_idle module=sync status=ok epoch={epoch}"),
        }
    }

    /// Detaches the live subscription and clears the cache.
    pub fn teardown(&self) {
        self.activate(None);
    }

    /// Opens a fresh subscription for the current owner.
    ///
    /// Last-known notes stay visible until the new stream's first snapshot
    /// replaces them. Returns `false` when no owner is active.
    pub fn resubscribe(&self) -> bool {
        let Some((owner, epoch)) = self.cache.restart() else {
            debug!("event=sync_resubscribe module=sync status=skipped reason=no_owner");
            return false;
        };
        self.detach();
        self.open_stream(owner, epoch);
        true
    }

    fn open_stream(&self, owner: OwnerId, epoch: u64) {
        info!("event=sync_subscribe module=sync status=start owner={owner} epoch={epoch}");
        let listener = snapshot_listener(Arc::clone(&self.cache), owner.clone(), epoch);

        match self.store.subscribe(NoteQuery::owned_by(owner.clone()), listener) {
            Ok(subscription) => {
                if self.cache.epoch() != epoch {
                    // Superseded while subscribing; dropping disposes it.
                    debug!(
                        "event=sync_subscribe module=sync status=superseded owner={owner} epoch={epoch}"
                    );
                    return;
                }
                let previous = self.lock_subscription().replace(subscription);
                if let Some(mut previous) = previous {
                    previous.dispose();
                }
                info!("event=sync_subscribe module=sync status=ok owner={owner} epoch={epoch}");
            }
            Err(err) => {
                error!(
                    "event=sync_subscribe module=sync status=error owner={owner} epoch={epoch} error_code={} error={err}",
                    err.code()
                );
                self.cache
                    .apply_stream_error(epoch, SyncError::SubscribeFailed(err));
            }
        }
    }

    fn detach(&self) {
        let current = self.lock_subscription().take();
        if let Some(mut subscription) = current {
            if subscription.dispose() {
                info!("event=sync_unsubscribe module=sync status=ok");
            }
        }
    }

    fn lock_subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.detach();
    }
}

fn snapshot_listener(cache: Arc<NoteCache>, owner: OwnerId, epoch: u64) -> SnapshotListener {
    Arc::new(move |event| match event {
        SubscriptionEvent::Snapshot(documents) => {
            let received = documents.len();
            let notes = normalize_snapshot(documents, &owner, now_millis());
            if cache.apply_snapshot(epoch, notes) {
                debug!(
                    "event=sync_snapshot module=sync status=applied epoch={epoch} records={received}"
                );
            }
        }
        SubscriptionEvent::Error(err) => {
            error!(
                "event=sync_stream module=sync status=error owner={owner} epoch={epoch} error_code={} error={err}",
                err.code()
            );
            cache.apply_stream_error(epoch, SyncError::SubscriptionBroken(err));
        }
    })
}
