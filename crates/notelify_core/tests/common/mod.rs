#![allow(dead_code)]

use async_trait::async_trait;
use notelify_core::{
    AuthGate, NewNoteDocument, NoteDocument, NoteId, NotePatch, NoteQuery, NoteStore,
    NotesSession, OwnerId, SnapshotListener, StoreError, StoreResult, Subscription,
    SubscriptionEvent,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// In-memory store double whose pushes, failures and write timing are
/// driven by the test.
pub struct ScriptedStore {
    state: Arc<Mutex<ScriptState>>,
    write_gate: Mutex<Option<Arc<Notify>>>,
}

struct ScriptState {
    documents: Vec<NoteDocument>,
    listeners: BTreeMap<u64, (NoteQuery, SnapshotListener)>,
    last_listener: Option<SnapshotListener>,
    next_listener_id: u64,
    next_note_id: u64,
    clock: i64,
    deliver_on_subscribe: bool,
    push_after_write: bool,
    fail_subscribe: Option<StoreError>,
    fail_write: Option<StoreError>,
    subscribe_calls: usize,
    write_calls: usize,
    disposed: usize,
}

impl ScriptedStore {
    /// Behaves like a live backend: snapshots on subscribe and after writes.
    pub fn live() -> Arc<Self> {
        Self::build(true, true)
    }

    /// Never pushes on its own; tests call `push_snapshot`.
    pub fn manual() -> Arc<Self> {
        Self::build(false, false)
    }

    fn build(deliver_on_subscribe: bool, push_after_write: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(ScriptState {
                documents: Vec::new(),
                listeners: BTreeMap::new(),
                last_listener: None,
                next_listener_id: 1,
                next_note_id: 1,
                clock: 1_000,
                deliver_on_subscribe,
                push_after_write,
                fail_subscribe: None,
                fail_write: None,
                subscribe_calls: 0,
                write_calls: 0,
                disposed: 0,
            })),
            write_gate: Mutex::new(None),
        })
    }

    pub fn seed(&self, document: NoteDocument) {
        self.lock().documents.push(document);
    }

    pub fn documents(&self) -> Vec<NoteDocument> {
        self.lock().documents.clone()
    }

    pub fn document(&self, id: &NoteId) -> Option<NoteDocument> {
        self.lock()
            .documents
            .iter()
            .find(|document| &document.id == id)
            .cloned()
    }

    pub fn fail_next_subscribe(&self, error: StoreError) {
        self.lock().fail_subscribe = Some(error);
    }

    pub fn fail_next_write(&self, error: StoreError) {
        self.lock().fail_write = Some(error);
    }

    /// Parks every later write until the returned handle is notified once
    /// per write.
    pub fn hold_writes(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.write_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscribe_calls
    }

    pub fn write_calls(&self) -> usize {
        self.lock().write_calls
    }

    pub fn disposed(&self) -> usize {
        self.lock().disposed
    }

    pub fn active_listeners(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Most recently registered listener, even if it has been detached.
    ///
    /// Calling it simulates a callback the backend had already queued.
    pub fn last_listener(&self) -> Option<SnapshotListener> {
        self.lock().last_listener.clone()
    }

    /// Pushes the current ordered contents to every live listener.
    pub fn push_snapshot(&self) {
        let deliveries: Vec<(SnapshotListener, Vec<NoteDocument>)> = {
            let state = self.lock();
            state
                .listeners
                .values()
                .map(|(query, listener)| (Arc::clone(listener), snapshot_for(&state, query)))
                .collect()
        };
        for (listener, documents) in deliveries {
            listener(SubscriptionEvent::Snapshot(documents));
        }
    }

    /// Pushes `documents` verbatim to every live listener.
    pub fn push_raw(&self, documents: Vec<NoteDocument>) {
        for listener in self.live_listeners() {
            listener(SubscriptionEvent::Snapshot(documents.clone()));
        }
    }

    /// Terminates every live stream with `error`.
    pub fn break_streams(&self, error: StoreError) {
        let broken: Vec<SnapshotListener> = {
            let mut state = self.lock();
            let listeners = std::mem::take(&mut state.listeners);
            listeners.into_values().map(|(_, listener)| listener).collect()
        };
        for listener in broken {
            listener(SubscriptionEvent::Error(error.clone()));
        }
    }

    fn live_listeners(&self) -> Vec<SnapshotListener> {
        self.lock()
            .listeners
            .values()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    async fn begin_write(&self) -> StoreResult<()> {
        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut state = self.lock();
        state.write_calls += 1;
        match state.fail_write.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn finish_write(&self) {
        let push = self.lock().push_after_write;
        if push {
            self.push_snapshot();
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }
}

fn snapshot_for(state: &ScriptState, query: &NoteQuery) -> Vec<NoteDocument> {
    let mut documents: Vec<NoteDocument> = state
        .documents
        .iter()
        .filter(|document| query.matches(document))
        .cloned()
        .collect();
    documents.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
    documents
}

fn tick(state: &mut ScriptState) -> i64 {
    state.clock += 1;
    state.clock
}

#[async_trait]
impl NoteStore for ScriptedStore {
    fn subscribe(
        &self,
        query: NoteQuery,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription> {
        let (id, initial) = {
            let mut state = self.lock();
            state.subscribe_calls += 1;
            if let Some(error) = state.fail_subscribe.take() {
                return Err(error);
            }
            let id = state.next_listener_id;
            state.next_listener_id += 1;
            state.last_listener = Some(Arc::clone(&listener));
            let initial = state
                .deliver_on_subscribe
                .then(|| snapshot_for(&state, &query));
            state.listeners.insert(id, (query, Arc::clone(&listener)));
            (id, initial)
        };

        if let Some(documents) = initial {
            listener(SubscriptionEvent::Snapshot(documents));
        }

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(move || {
            let mut state = state.lock().unwrap();
            state.listeners.remove(&id);
            state.disposed += 1;
        }))
    }

    async fn create(&self, document: NewNoteDocument) -> StoreResult<NoteId> {
        self.begin_write().await?;
        let id = {
            let mut state = self.lock();
            let id = NoteId::new(format!("note-{}", state.next_note_id));
            state.next_note_id += 1;
            let stamp = tick(&mut state);
            state.documents.push(NoteDocument {
                id: id.clone(),
                title: Some(document.title),
                content: Some(document.content),
                user_id: document.user_id,
                created_at: Some(stamp),
                updated_at: Some(stamp),
            });
            id
        };
        self.finish_write();
        Ok(id)
    }

    async fn update(&self, owner: &OwnerId, id: &NoteId, patch: &NotePatch) -> StoreResult<()> {
        self.begin_write().await?;
        {
            let mut state = self.lock();
            let stamp = tick(&mut state);
            let Some(document) = state.documents.iter_mut().find(|doc| &doc.id == id) else {
                return Err(StoreError::NotFound(id.clone()));
            };
            if &document.user_id != owner {
                return Err(StoreError::Denied(format!("note {id} belongs to another owner")));
            }
            if let Some(title) = patch.title.as_ref() {
                document.title = Some(title.clone());
            }
            if let Some(content) = patch.content.as_ref() {
                document.content = Some(content.clone());
            }
            document.updated_at = Some(stamp);
        }
        self.finish_write();
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, id: &NoteId) -> StoreResult<()> {
        self.begin_write().await?;
        {
            let mut state = self.lock();
            let Some(index) = state.documents.iter().position(|doc| &doc.id == id) else {
                return Err(StoreError::NotFound(id.clone()));
            };
            if &state.documents[index].user_id != owner {
                return Err(StoreError::Denied(format!("note {id} belongs to another owner")));
            }
            state.documents.remove(index);
        }
        self.finish_write();
        Ok(())
    }
}

pub fn doc(id: &str, owner: &str, title: &str, content: &str, updated_at: i64) -> NoteDocument {
    NoteDocument {
        id: NoteId::from(id),
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        user_id: OwnerId::from(owner),
        created_at: Some(updated_at),
        updated_at: Some(updated_at),
    }
}

pub fn ids(notes: &[notelify_core::Note]) -> Vec<String> {
    notes.iter().map(|note| note.id.as_str().to_string()).collect()
}

/// Session over `store` with `owner` already logged in.
pub fn session_for(store: &Arc<ScriptedStore>, owner: &str) -> NotesSession {
    let dyn_store: Arc<dyn NoteStore> = Arc::clone(store) as Arc<dyn NoteStore>;
    let session = NotesSession::new(dyn_store, Arc::new(AuthGate::new()));
    session.login(OwnerId::from(owner));
    session
}
