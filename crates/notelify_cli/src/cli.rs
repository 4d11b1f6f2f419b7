use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Clone, Debug, Eq, Parser, PartialEq)]
#[command(version, about = "Manage one owner's notes in a local Notelify store")]
pub struct CliArgs {
    /// Owner whose notes are listed and edited.
    #[arg(long, env = "NOTELIFY_OWNER")]
    pub owner: String,

    /// SQLite store file; an in-memory store is used when omitted.
    #[arg(long, env = "NOTELIFY_DB")]
    pub db: Option<PathBuf>,

    #[arg(long, env = "NOTELIFY_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Absolute directory for rotating log files; logging is off when omitted.
    #[arg(long, env = "NOTELIFY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Eq, PartialEq, Subcommand)]
pub enum Command {
    /// List notes, newest first.
    List {
        #[arg(long, short = 'q', default_value = "")]
        query: String,
    },
    /// Create a note.
    Add {
        #[arg(long, short = 't', default_value = "")]
        title: String,
        #[arg(long, short = 'c', default_value = "")]
        content: String,
    },
    /// Replace the title and/or content of a note.
    Edit {
        id: String,
        #[arg(long, short = 't')]
        title: Option<String>,
        #[arg(long, short = 'c')]
        content: Option<String>,
    },
    /// Delete a note; requires --yes.
    Delete {
        id: String,
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
    /// Print one note.
    Show { id: String },
}
