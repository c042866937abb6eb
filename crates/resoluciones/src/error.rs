use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolucionesError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Retention error: {0}")]
    Retention(#[from] RetentionError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write manifest '{path}': {source}")]
    WriteManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read manifest '{path}': {source}")]
    ReadManifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest '{path}' is not a JSON list of paths: {source}")]
    ParseManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PDF '{path}': {message}")]
    PdfParse { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database unavailable: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Phase '{phase}' failed: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: crate::db::DatabaseError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy file from '{from}' to '{to}': {source}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write retention log '{path}': {source}")]
    WriteLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ResolucionesError>;
