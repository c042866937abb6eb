use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::scanner::is_candidate;
use crate::validator::ValidDocument;

use super::filesystem::{available_path, copy_preserving_mtime, ensure_directory, move_file};

/// Final placement of one document.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub filename: String,
    pub backup_path: PathBuf,
    pub final_path: PathBuf,
}

#[derive(Debug)]
pub struct ArchiveFailure {
    pub filename: String,
    /// Set when the file already reached the backup directory.
    pub backup_path: Option<PathBuf>,
    pub error: StorageError,
}

#[derive(Debug, Default)]
pub struct PurgeOutcome {
    pub files_removed: usize,
    pub directories_removed: usize,
    pub failures: Vec<String>,
}

#[derive(Debug)]
pub struct ArchiveOutcome {
    pub log_path: PathBuf,
    pub entries: Vec<ArchiveEntry>,
    pub failures: Vec<ArchiveFailure>,
    pub purge: PurgeOutcome,
}

/// Moves validated documents into the backup directory and the
/// year-partitioned archive, then clears the intake share.
pub struct Archiver {
    backup_dir: PathBuf,
    target_dir: PathBuf,
    log_dir: PathBuf,
    source_dir: PathBuf,
}

impl Archiver {
    pub fn new<P: AsRef<Path>>(backup_dir: P, target_dir: P, log_dir: P, source_dir: P) -> Self {
        Self {
            backup_dir: backup_dir.as_ref().to_path_buf(),
            target_dir: target_dir.as_ref().to_path_buf(),
            log_dir: log_dir.as_ref().to_path_buf(),
            source_dir: source_dir.as_ref().to_path_buf(),
        }
    }

    /// Archives every document of the batch and writes the run log.
    ///
    /// Per-file failures are collected; only failing to create the backup or
    /// log directories, or to write the log itself, aborts.
    pub fn archive(&self, batch: &[ValidDocument]) -> Result<ArchiveOutcome, StorageError> {
        ensure_directory(&self.log_dir)?;
        ensure_directory(&self.backup_dir)?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let log_path = self.log_dir.join(format!("registro_{}.txt", timestamp));

        let mut entries = Vec::new();
        let mut failures = Vec::new();

        info!("Archiving {} documents", batch.len());
        for doc in batch {
            match self.archive_one(doc) {
                Ok(entry) => entries.push(entry),
                Err(failure) => {
                    warn!(
                        "Could not archive {}: {}",
                        failure.filename, failure.error
                    );
                    failures.push(failure);
                }
            }
        }

        write_run_log(&log_path, &timestamp, &entries, &failures)?;
        info!("Run log written to {}", log_path.display());

        let purge = purge_source(&self.source_dir);

        Ok(ArchiveOutcome {
            log_path,
            entries,
            failures,
            purge,
        })
    }

    fn archive_one(&self, doc: &ValidDocument) -> Result<ArchiveEntry, ArchiveFailure> {
        let filename = doc.document.original_filename.clone();

        let backup_path = available_path(&self.backup_dir, &filename);
        debug!(
            "Moving {} to backup {}",
            doc.staged_path.display(),
            backup_path.display()
        );
        move_file(&doc.staged_path, &backup_path).map_err(|error| ArchiveFailure {
            filename: filename.clone(),
            backup_path: None,
            error,
        })?;

        let fail_after_backup = |error| ArchiveFailure {
            filename: filename.clone(),
            backup_path: Some(backup_path.clone()),
            error,
        };

        let year_dir = self.target_dir.join(doc.document.year_token());
        ensure_directory(&year_dir).map_err(fail_after_backup)?;

        let final_path = available_path(&year_dir, &filename);
        debug!(
            "Copying {} to {}",
            backup_path.display(),
            final_path.display()
        );
        copy_preserving_mtime(&backup_path, &final_path)
            .map_err(|e| StorageError::CopyFile {
                from: backup_path.clone(),
                to: final_path.clone(),
                source: e,
            })
            .map_err(fail_after_backup)?;

        Ok(ArchiveEntry {
            filename,
            backup_path,
            final_path,
        })
    }
}

fn write_run_log(
    log_path: &Path,
    timestamp: &str,
    entries: &[ArchiveEntry],
    failures: &[ArchiveFailure],
) -> Result<(), StorageError> {
    let write_err = |e| StorageError::WriteFile {
        path: log_path.to_path_buf(),
        source: e,
    };

    let mut file = File::create(log_path).map_err(write_err)?;
    let mut body = format!(
        "Proceso ejecutado el: {}\nArchivos procesados:\n",
        timestamp
    );
    for entry in entries {
        let backup_name = entry
            .backup_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        body.push_str(&format!(
            "{} movido a BK -> {} y copiado a {}\n",
            entry.filename,
            backup_name,
            entry.final_path.display()
        ));
    }
    for failure in failures {
        match &failure.backup_path {
            Some(backup) => body.push_str(&format!(
                "ERROR {} quedo en BK {}: {}\n",
                failure.filename,
                backup.display(),
                failure.error
            )),
            None => body.push_str(&format!(
                "ERROR {} no se movio: {}\n",
                failure.filename, failure.error
            )),
        }
    }

    file.write_all(body.as_bytes()).map_err(write_err)?;
    Ok(())
}

/// Deletes every candidate document left under `source_dir`, then removes
/// the subdirectories that became empty, deepest first. The root stays.
pub fn purge_source(source_dir: &Path) -> PurgeOutcome {
    let mut outcome = PurgeOutcome::default();
    if !source_dir.exists() {
        return outcome;
    }

    info!("Removing originals under {}", source_dir.display());
    for entry in WalkDir::new(source_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_candidate(e.path()))
    {
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("Removed original {}", entry.path().display());
                outcome.files_removed += 1;
            }
            Err(e) => {
                warn!("Could not remove {}: {}", entry.path().display(), e);
                outcome
                    .failures
                    .push(format!("{}: {}", entry.path().display(), e));
            }
        }
    }

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        let is_empty = std::fs::read_dir(entry.path())
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }
        match std::fs::remove_dir(entry.path()) {
            Ok(()) => {
                debug!("Removed empty directory {}", entry.path().display());
                outcome.directories_removed += 1;
            }
            Err(e) => {
                warn!("Could not remove {}: {}", entry.path().display(), e);
                outcome
                    .failures
                    .push(format!("{}: {}", entry.path().display(), e));
            }
        }
    }

    info!("Removed {} originals", outcome.files_removed);
    outcome
}
