mod common;

use common::{doc, ids, session_for, ScriptedStore};
use notelify_core::{
    DeleteOutcome, EditorController, EditorError, EditorTarget, NoteId, NotesError, SaveOutcome,
    StoreError, UNTITLED_NOTE_TITLE,
};
use std::cell::Cell;

#[tokio::test]
async fn blank_draft_save_performs_no_network_call() {
    let store = ScriptedStore::live();
    let session = session_for(&store, "alice");
    let editor = EditorController::new_note();
    editor.set_title("   ");
    editor.set_content("\n\t");

    let outcome = editor.save(session.gateway()).await.unwrap();

    assert_eq!(outcome, SaveOutcome::Skipped);
    assert_eq!(store.write_calls(), 0);
    assert!(!editor.is_saving());
}

#[tokio::test]
async fn creating_trims_values_and_rebinds_to_new_note() {
    let store = ScriptedStore::live();
    let session = session_for(&store, "alice");
    let editor = EditorController::new_note();
    editor.set_content("  buy milk  ");

    let outcome = editor.save(session.gateway()).await.unwrap();
    let SaveOutcome::Created(id) = outcome else {
        panic!("expected a created note, got {outcome:?}");
    };

    let stored = store.document(&id).unwrap();
    assert_eq!(stored.title.as_deref(), Some(UNTITLED_NOTE_TITLE));
    assert_eq!(stored.content.as_deref(), Some("buy milk"));
    assert_eq!(editor.target(), EditorTarget::Existing(id.clone()));
    assert!(!editor.is_dirty());

    editor.set_title("Groceries");
    let outcome = editor.save(session.gateway()).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Updated(id.clone()));
    assert_eq!(store.documents().len(), 1);
    assert_eq!(session.note(&id).unwrap().title, "Groceries");
}

#[tokio::test]
async fn failed_save_clears_flag_and_keeps_draft() {
    let store = ScriptedStore::live();
    store.seed(doc("n1", "alice", "Shopping", "milk", 10));
    let session = session_for(&store, "alice");
    let editor = EditorController::for_note(&session.notes()[0]);
    editor.set_content("milk, eggs");

    store.fail_next_write(StoreError::Unavailable("offline".to_string()));
    let err = editor.save(session.gateway()).await.unwrap_err();

    assert_eq!(
        err,
        EditorError::Save(NotesError::Unavailable("offline".to_string()))
    );
    assert_eq!(err.user_message(), "Failed to save note. Please try again.");
    assert_eq!(editor.last_error(), Some(err));
    assert!(!editor.is_saving());
    assert!(editor.is_dirty());
    assert_eq!(editor.content(), "milk, eggs");
    assert_eq!(session.notes()[0].content, "milk");

    editor.save(session.gateway()).await.unwrap();
    assert!(editor.last_error().is_none());
    assert_eq!(session.notes()[0].content, "milk, eggs");
}

#[tokio::test]
async fn saving_flag_blocks_concurrent_save() {
    let store = ScriptedStore::live();
    let session = session_for(&store, "alice");
    let editor = EditorController::new_note();
    editor.set_title("Draft");
    let gate = store.hold_writes();

    let (first, second) = tokio::join!(editor.save(session.gateway()), async {
        assert!(editor.is_saving());
        assert!(!editor.can_save());
        let second = editor.save(session.gateway()).await;
        gate.notify_one();
        second
    });

    assert!(matches!(first.unwrap(), SaveOutcome::Created(_)));
    assert_eq!(second.unwrap(), SaveOutcome::Busy);
    assert!(!editor.is_saving());
    assert_eq!(store.write_calls(), 1);
}

#[tokio::test]
async fn declined_confirmation_skips_delete() {
    let store = ScriptedStore::live();
    store.seed(doc("n1", "alice", "Shopping", "milk", 10));
    let session = session_for(&store, "alice");
    let editor = EditorController::for_note(&session.notes()[0]);
    let asked = Cell::new(false);

    let outcome = editor
        .delete(session.gateway(), |id, title| {
            asked.set(true);
            assert_eq!(id, &NoteId::from("n1"));
            assert_eq!(title, "Shopping");
            false
        })
        .await
        .unwrap();

    assert!(asked.get());
    assert_eq!(outcome, DeleteOutcome::Cancelled);
    assert_eq!(store.write_calls(), 0);
    assert_eq!(ids(&session.notes()), vec!["n1"]);
}

#[tokio::test]
async fn confirmed_delete_removes_note() {
    let store = ScriptedStore::live();
    store.seed(doc("n1", "alice", "Shopping", "milk", 10));
    let session = session_for(&store, "alice");
    let editor = EditorController::for_note(&session.notes()[0]);

    let outcome = editor.delete(session.gateway(), |_, _| true).await.unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted(NoteId::from("n1")));
    assert!(session.notes().is_empty());
    assert!(!editor.is_deleting());
}

#[tokio::test]
async fn delete_without_target_or_with_failure() {
    let store = ScriptedStore::live();
    store.seed(doc("n1", "alice", "Shopping", "milk", 10));
    let session = session_for(&store, "alice");

    let fresh = EditorController::new_note();
    let outcome = fresh
        .delete(session.gateway(), |_, _| panic!("no confirmation for unsaved notes"))
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::NoTarget);

    let editor = EditorController::for_note(&session.notes()[0]);
    store.fail_next_write(StoreError::Denied("rules".to_string()));
    let err = editor.delete(session.gateway(), |_, _| true).await.unwrap_err();

    assert_eq!(err.user_message(), "Failed to delete note. Please try again.");
    assert_eq!(err.cause(), &NotesError::Denied("rules".to_string()));
    assert!(!editor.is_deleting());
    assert_eq!(ids(&session.notes()), vec!["n1"]);
}
