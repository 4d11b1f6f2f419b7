//! `notelify` command-line front end.
//!
//! # Responsibility
//! - Map CLI arguments onto `CoreConfig`, logging and a SQLite store.
//! - Drive the same session, editor and list view a UI would use.

use crate::cli::{CliArgs, Command};
use clap::Parser;
use log::{error, info};
use notelify_core::{
    init_logging_from_config, AuthGate, CoreConfig, DeleteOutcome, EditorController, NoteId,
    NoteStore, NotesSession, OwnerId, SaveOutcome, SqliteNoteStore, DELETE_CONFIRMATION_PROMPT,
};
use std::process::ExitCode;
use std::sync::Arc;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(message) => return fail(&message),
    };
    if let Err(message) = init_logging_from_config(&config) {
        return fail(&message);
    }

    let owner = args.owner.trim();
    if owner.is_empty() {
        return fail("--owner cannot be empty");
    }

    let store: Arc<dyn NoteStore> = match open_store(&config) {
        Ok(store) => Arc::new(store),
        Err(message) => return fail(&message),
    };
    let session = NotesSession::new(store, Arc::new(AuthGate::new()));
    session.login(OwnerId::new(owner));
    if let Some(fatal) = session.status().fatal_error {
        error!("event=cli_sync module=cli status=error error={fatal}");
        return fail(fatal.user_message());
    }

    match run(&session, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => fail(&message),
    }
}

fn build_config(args: &CliArgs) -> Result<CoreConfig, String> {
    let mut config = CoreConfig {
        log_dir: args.log_dir.clone(),
        store_path: args.db.clone(),
        ..CoreConfig::default()
    };
    if let Some(level) = args.log_level.as_ref() {
        config.log_level = level.clone();
    }
    config.validate()
}

fn open_store(config: &CoreConfig) -> Result<SqliteNoteStore, String> {
    let opened = match config.store_path.as_ref() {
        Some(path) => SqliteNoteStore::open(path),
        None => SqliteNoteStore::open_in_memory(),
    };
    opened.map_err(|err| format!("failed to open note store: {err}"))
}

async fn run(session: &NotesSession, command: Command) -> Result<(), String> {
    match command {
        Command::List { query } => {
            print_list(session, &query);
            Ok(())
        }
        Command::Add { title, content } => {
            let editor = EditorController::new_note();
            editor.set_title(title);
            editor.set_content(content);
            match editor.save(session.gateway()).await {
                Ok(SaveOutcome::Created(id)) => {
                    println!("{id}");
                    Ok(())
                }
                Ok(SaveOutcome::Skipped) => {
                    Err("nothing to save: title and content are empty".to_string())
                }
                Ok(other) => Err(format!("unexpected save outcome: {other:?}")),
                Err(err) => Err(err.user_message().to_string()),
            }
        }
        Command::Edit { id, title, content } => {
            if title.is_none() && content.is_none() {
                return Err("nothing to change: pass --title and/or --content".to_string());
            }
            let note = session
                .note(&NoteId::new(id.as_str()))
                .ok_or_else(|| format!("note not found: {id}"))?;
            let editor = EditorController::for_note(&note);
            if let Some(title) = title {
                editor.set_title(title);
            }
            if let Some(content) = content {
                editor.set_content(content);
            }
            match editor.save(session.gateway()).await {
                Ok(SaveOutcome::Updated(id)) => {
                    println!("{id}");
                    Ok(())
                }
                Ok(SaveOutcome::Skipped) => Err("refusing to save a blank note".to_string()),
                Ok(other) => Err(format!("unexpected save outcome: {other:?}")),
                Err(err) => Err(err.user_message().to_string()),
            }
        }
        Command::Delete { id, yes } => {
            let note = session
                .note(&NoteId::new(id.as_str()))
                .ok_or_else(|| format!("note not found: {id}"))?;
            let editor = EditorController::for_note(&note);
            match editor.delete(session.gateway(), |_, _| yes).await {
                Ok(DeleteOutcome::Deleted(id)) => {
                    info!("event=cli_delete module=cli status=ok note_id={id}");
                    println!("deleted {id}");
                    Ok(())
                }
                Ok(DeleteOutcome::Cancelled) => Err(format!(
                    "{DELETE_CONFIRMATION_PROMPT} Re-run with --yes to delete \"{}\".",
                    note.title
                )),
                Ok(other) => Err(format!("unexpected delete outcome: {other:?}")),
                Err(err) => Err(err.user_message().to_string()),
            }
        }
        Command::Show { id } => {
            let note = session
                .note(&NoteId::new(id.as_str()))
                .ok_or_else(|| format!("note not found: {id}"))?;
            println!("id: {}", note.id);
            println!("title: {}", note.title);
            println!("created_at: {}", note.created_at);
            println!("updated_at: {}", note.updated_at);
            println!();
            println!("{}", note.content);
            Ok(())
        }
    }
}

fn print_list(session: &NotesSession, query: &str) {
    let view = session.list_view(query);
    if let Some(message) = view.empty_message {
        println!("{message}");
        if let Some(hint) = view.search_hint {
            println!("{hint}");
        }
        return;
    }
    for item in view.items {
        println!("{}\t{}\t{}", item.id, item.title, item.age_label);
        println!("\t{}", item.preview);
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("notelify: {message}");
    ExitCode::FAILURE
}
