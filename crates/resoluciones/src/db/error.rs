use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open records database '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cannot create database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema setup stopped at `version`; earlier versions stay applied.
    #[error("Schema migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    #[error("Database handle poisoned by a panicking caller")]
    LockPoisoned,
}
