//! SQLite-backed reference implementation of the remote note store.
//!
//! # Responsibility
//! - Persist the `notes` collection in one SQLite database.
//! - Assign ids and server timestamps on create/update.
//! - Push a fresh ordered snapshot to every live listener after each write.
//!
//! # Invariants
//! - Server timestamps are strictly increasing per store instance.
//! - `update` writes only supplied fields plus `updated_at`.
//! - `delete` removes the row; there is no tombstone.
//! - `update` and `delete` only touch rows of the acting owner.
//! - Listener callbacks run without any store lock held.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use crate::model::note::{
    advance_timestamp, now_millis, EpochMillis, NoteDocument, NoteId, NotePatch, OwnerId,
};
use crate::store::{
    NewNoteDocument, NoteQuery, NoteStore, SnapshotListener, StoreError, StoreResult,
    Subscription, SubscriptionEvent,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const SNAPSHOT_SQL: &str = "SELECT
    id,
    title,
    content,
    user_id,
    created_at,
    updated_at
FROM notes
WHERE user_id = ?1
ORDER BY updated_at DESC, id ASC;";

struct RegisteredListener {
    query: NoteQuery,
    listener: SnapshotListener,
}

type ListenerMap = BTreeMap<u64, RegisteredListener>;

/// Note store over a local SQLite database.
///
/// This is a blocking reference backend: every call, including the
/// snapshot fan-out to listeners after a write, runs synchronously on the
/// calling thread. Drive it from a current-thread runtime or wrap calls in
/// `spawn_blocking` when sharing a multi-threaded executor.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
    listeners: Arc<Mutex<ListenerMap>>,
    next_listener_id: AtomicU64,
    last_server_time: Mutex<EpochMillis>,
}

impl SqliteNoteStore {
    /// Opens (and migrates) a store file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::from_connection(open_db(path)?)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(open_db_in_memory()?)
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> DbResult<Self> {
        let last_server_time: EpochMillis = conn.query_row(
            "SELECT MAX(COALESCE(MAX(created_at), 0), COALESCE(MAX(updated_at), 0)) FROM notes;",
            [],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_listener_id: AtomicU64::new(1),
            last_server_time: Mutex::new(last_server_time),
        })
    }

    /// Writes one raw record verbatim and notifies listeners.
    ///
    /// Used for imports and fixtures where identity and timestamps already
    /// exist; missing fields are stored as NULL.
    pub fn insert_document(&self, document: &NoteDocument) -> StoreResult<()> {
        {
            let conn = self.lock_conn();
            conn.execute(
                "INSERT OR REPLACE INTO notes (id, title, content, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    document.id.as_str(),
                    document.title,
                    document.content,
                    document.user_id.as_str(),
                    document.created_at,
                    document.updated_at,
                ],
            )?;
        }
        for stamp in [document.created_at, document.updated_at].into_iter().flatten() {
            let mut last = lock_recover(&self.last_server_time);
            *last = (*last).max(stamp);
        }
        self.publish();
        Ok(())
    }

    /// Number of subscriptions currently attached.
    pub fn listener_count(&self) -> usize {
        lock_recover(&self.listeners).len()
    }

    /// Reads the current ordered contents for `query`.
    pub fn load_snapshot(&self, query: &NoteQuery) -> StoreResult<Vec<NoteDocument>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare(SNAPSHOT_SQL)?;
        let mut rows = stmt.query([query.owner.as_str()])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        lock_recover(&self.conn)
    }

    fn server_now(&self) -> EpochMillis {
        let mut last = lock_recover(&self.last_server_time);
        let stamp = advance_timestamp(*last, now_millis());
        *last = stamp;
        stamp
    }

    fn publish(&self) {
        let targets: Vec<(u64, NoteQuery, SnapshotListener)> = lock_recover(&self.listeners)
            .iter()
            .map(|(id, registered)| {
                (
                    *id,
                    registered.query.clone(),
                    Arc::clone(&registered.listener),
                )
            })
            .collect();

        for (listener_id, query, listener) in targets {
            match self.load_snapshot(&query) {
                Ok(documents) => {
                    debug!(
                        "event=store_publish module=store status=ok listener={listener_id} records={}",
                        documents.len()
                    );
                    listener(SubscriptionEvent::Snapshot(documents));
                }
                Err(err) => {
                    warn!(
                        "event=store_publish module=store status=error listener={listener_id} error_code={}",
                        err.code()
                    );
                    lock_recover(&self.listeners).remove(&listener_id);
                    listener(SubscriptionEvent::Error(err));
                }
            }
        }
    }

    fn create_blocking(&self, document: &NewNoteDocument) -> StoreResult<NoteId> {
        let id = NoteId::new(Uuid::new_v4().to_string());
        let stamp = self.server_now();
        let conn = self.lock_conn();
        conn.execute(
            "INSERT INTO notes (id, title, content, user_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5);",
            params![
                id.as_str(),
                document.title,
                document.content,
                document.user_id.as_str(),
                stamp,
            ],
        )?;
        Ok(id)
    }

    fn update_blocking(
        &self,
        owner: &OwnerId,
        id: &NoteId,
        patch: &NotePatch,
    ) -> StoreResult<()> {
        let stamp = self.server_now();
        let mut sql = String::from("UPDATE notes SET updated_at = ?");
        let mut bind_values = vec![Value::Integer(stamp)];
        if let Some(title) = patch.title.as_ref() {
            sql.push_str(", title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(content) = patch.content.as_ref() {
            sql.push_str(", content = ?");
            bind_values.push(Value::Text(content.clone()));
        }
        sql.push_str(" WHERE id = ? AND user_id = ?;");
        bind_values.push(Value::Text(id.as_str().to_string()));
        bind_values.push(Value::Text(owner.as_str().to_string()));

        let conn = self.lock_conn();
        let changed = conn.execute(&sql, params_from_iter(bind_values))?;
        if changed == 0 {
            return Err(missed_write(&conn, "update", owner, id));
        }
        Ok(())
    }

    fn delete_blocking(&self, owner: &OwnerId, id: &NoteId) -> StoreResult<()> {
        let conn = self.lock_conn();
        let changed = conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2;",
            params![id.as_str(), owner.as_str()],
        )?;
        if changed == 0 {
            return Err(missed_write(&conn, "delete", owner, id));
        }
        Ok(())
    }
}

/// Classifies a write that matched no row: foreign owner or unknown id.
fn missed_write(conn: &Connection, op: &str, owner: &OwnerId, id: &NoteId) -> StoreError {
    let existing = conn
        .query_row(
            "SELECT user_id FROM notes WHERE id = ?1;",
            [id.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional();
    match existing {
        Ok(Some(_)) => {
            warn!(
                "event=store_{op} module=store status=denied note_id={id} owner={owner}"
            );
            StoreError::Denied(format!("note {id} belongs to another owner"))
        }
        Ok(None) => StoreError::NotFound(id.clone()),
        Err(err) => StoreError::from(err),
    }
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    fn subscribe(
        &self,
        query: NoteQuery,
        listener: SnapshotListener,
    ) -> StoreResult<Subscription> {
        let initial = self.load_snapshot(&query)?;
        let listener_id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock_recover(&self.listeners).insert(
            listener_id,
            RegisteredListener {
                query: query.clone(),
                listener: Arc::clone(&listener),
            },
        );
        info!(
            "event=store_subscribe module=store status=ok listener={listener_id} owner={}",
            query.owner
        );

        listener(SubscriptionEvent::Snapshot(initial));

        let listeners = Arc::clone(&self.listeners);
        Ok(Subscription::new(move || {
            lock_recover(&listeners).remove(&listener_id);
            info!("event=store_unsubscribe module=store status=ok listener={listener_id}");
        }))
    }

    async fn create(&self, document: NewNoteDocument) -> StoreResult<NoteId> {
        let id = self.create_blocking(&document)?;
        self.publish();
        Ok(id)
    }

    async fn update(&self, owner: &OwnerId, id: &NoteId, patch: &NotePatch) -> StoreResult<()> {
        self.update_blocking(owner, id, patch)?;
        self.publish();
        Ok(())
    }

    async fn delete(&self, owner: &OwnerId, id: &NoteId) -> StoreResult<()> {
        self.delete_blocking(owner, id)?;
        self.publish();
        Ok(())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

fn parse_document_row(row: &Row<'_>) -> StoreResult<NoteDocument> {
    let id: String = row.get("id")?;
    let user_id: String = row.get("user_id")?;
    Ok(NoteDocument {
        id: NoteId::new(id),
        title: row.get("title")?,
        content: row.get("content")?,
        user_id: user_id.into(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn lock_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
