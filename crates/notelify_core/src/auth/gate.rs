//! Current-owner holder and login/logout transition source.
//!
//! # Invariants
//! - `current_owner()` is `None` exactly while unauthenticated.
//! - Each login emits one `LoggedIn`, each logout one `LoggedOut`.
//! - Switching owners without an explicit logout emits `LoggedOut` first.
//! - Repeating a login for the active owner, or a logout while
//!   unauthenticated, emits nothing.

use crate::model::note::OwnerId;
use log::info;
use tokio::sync::{broadcast, watch};

const TRANSITION_CHANNEL_CAPACITY: usize = 16;

/// Identity change observed by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTransition {
    LoggedIn(OwnerId),
    LoggedOut,
}

/// Read-only view of the authenticated owner plus a transition feed.
pub struct AuthGate {
    current: watch::Sender<Option<OwnerId>>,
    transitions: broadcast::Sender<AuthTransition>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    /// Creates an unauthenticated gate.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            current,
            transitions,
        }
    }

    pub fn current_owner(&self) -> Option<OwnerId> {
        self.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Watches the current owner value.
    pub fn watch_owner(&self) -> watch::Receiver<Option<OwnerId>> {
        self.current.subscribe()
    }

    /// Subscribes to transitions emitted after this call.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<AuthTransition> {
        self.transitions.subscribe()
    }

    /// Marks `owner` as authenticated and returns the emitted transitions.
    pub fn login(&self, owner: OwnerId) -> Vec<AuthTransition> {
        let mut previous = None;
        let changed = self.current.send_if_modified(|current| {
            if current.as_ref() == Some(&owner) {
                return false;
            }
            previous = current.replace(owner.clone());
            true
        });
        if !changed {
            return Vec::new();
        }

        let mut emitted = Vec::with_capacity(2);
        if let Some(previous) = previous {
            info!("event=auth_logout module=auth status=ok owner={previous} reason=switch");
            emitted.push(AuthTransition::LoggedOut);
        }
        info!("event=auth_login module=auth status=ok owner={owner}");
        emitted.push(AuthTransition::LoggedIn(owner));
        for transition in &emitted {
            self.emit(transition.clone());
        }
        emitted
    }

    /// Clears the authenticated owner; returns the transition if one occurred.
    pub fn logout(&self) -> Option<AuthTransition> {
        let previous = self.current.send_replace(None)?;
        info!("event=auth_logout module=auth status=ok owner={previous}");
        self.emit(AuthTransition::LoggedOut);
        Some(AuthTransition::LoggedOut)
    }

    fn emit(&self, transition: AuthTransition) {
        // No receivers is fine: followers attach lazily.
        let _ = self.transitions.send(transition);
    }
}
