use crate::app::{RecordService, Tables};
use crate::backends::{FilesystemBackend, MemoryBackend, SqliteBackend};
use crate::ui::Format;
use crate::{HostError, RecordStore};

use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use std::path::PathBuf;

/// Serve note and user requests against a key-value store
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Table holding notes
    #[arg(long, env = "NOTES_TABLE")]
    pub notes_table: String,
    /// Table holding users; user operations are rejected without it
    #[arg(long, env = "USERS_TABLE")]
    pub users_table: Option<String>,
    /// Read request envelopes from this file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = Format::Json)]
    pub format: Format,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub backend: Option<Backend>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Keep records in memory for the lifetime of the process (default)
    Memory,
    /// One JSON file per record under a directory
    Filesystem {
        #[arg(short, long)]
        path: PathBuf,
    },
    /// A single SQLite database file
    Sqlite {
        #[arg(short, long)]
        path: String,
    },
}

impl Args {
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        super::logging::level_for(self.verbose)
    }

    #[must_use]
    pub fn tables(&self) -> Tables {
        Tables {
            notes: self.notes_table.clone(),
            users: self.users_table.clone(),
        }
    }
}

/// Parses command-line arguments and the environment. A missing `NOTES_TABLE`
/// exits here with a usage error.
#[must_use]
pub fn handle_args() -> Args {
    Args::parse()
}

/// Opens the selected backend and wraps it in a `RecordService`
///
/// # Errors
///
/// Forwards the `StoreError` of a backend that fails to open
pub fn build_service(args: &Args) -> Result<RecordService, HostError> {
    // Allow any struct that implements RecordStore, and store on heap because size is unknown at compile time
    let store: Box<dyn RecordStore> = match args.backend.clone().unwrap_or(Backend::Memory) {
        Backend::Memory => Box::new(MemoryBackend::new()),
        Backend::Filesystem { path } => Box::new(FilesystemBackend::new(path)?),
        Backend::Sqlite { path } => Box::new(SqliteBackend::new(&path)?),
    };

    let tables = args.tables();
    info!(
        "Serving notes table '{}', users table {}",
        tables.notes,
        tables
            .users
            .as_deref()
            .map_or_else(|| "<none>".to_string(), |t| format!("'{t}'"))
    );
    Ok(RecordService::new(store, tables))
}
