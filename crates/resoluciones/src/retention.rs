//! Housekeeping for the local working directories.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::error::RetentionError;

pub const RETENTION_LOG_FILENAME: &str = "cleanup_log.txt";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Set only when something was deleted.
    pub log_path: Option<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

impl SweepOutcome {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// Deletes files older than `max_age_days` from a fixed set of directories.
/// Only immediate children are considered; subdirectories are left alone.
pub struct RetentionSweeper {
    directories: Vec<PathBuf>,
    max_age_days: u32,
    log_dir: PathBuf,
}

impl RetentionSweeper {
    pub fn new<P: AsRef<Path>>(directories: Vec<PathBuf>, max_age_days: u32, log_dir: P) -> Self {
        Self {
            directories,
            max_age_days,
            log_dir: log_dir.as_ref().to_path_buf(),
        }
    }

    pub fn sweep(&self) -> Result<SweepOutcome, RetentionError> {
        self.sweep_at(SystemTime::now())
    }

    /// Sweeps with `now` as the reference time.
    pub fn sweep_at(&self, now: SystemTime) -> Result<SweepOutcome, RetentionError> {
        let max_age = Duration::from_secs(u64::from(self.max_age_days) * SECONDS_PER_DAY);
        let cutoff = now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH);
        info!(
            "Sweeping files older than {} days",
            self.max_age_days
        );

        let mut deleted = Vec::new();
        for directory in &self.directories {
            deleted.extend(sweep_directory(directory, cutoff));
        }

        if deleted.is_empty() {
            info!("Nothing to sweep");
            return Ok(SweepOutcome::default());
        }

        let log_path = self.append_log(&deleted)?;
        info!("Swept {} files, log at {}", deleted.len(), log_path.display());

        Ok(SweepOutcome {
            log_path: Some(log_path),
            deleted,
        })
    }

    fn append_log(&self, deleted: &[PathBuf]) -> Result<PathBuf, RetentionError> {
        std::fs::create_dir_all(&self.log_dir).map_err(|e| RetentionError::CreateDirectory {
            path: self.log_dir.clone(),
            source: e,
        })?;

        let log_path = self.log_dir.join(RETENTION_LOG_FILENAME);
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");

        let mut block = format!("\nLimpieza realizada el: {}\n", timestamp);
        block.push_str(&format!(
            "Se eliminaron {} archivos mas antiguos de {} dias:\n",
            deleted.len(),
            self.max_age_days
        ));
        for path in deleted {
            block.push_str(&format!("- {}\n", path.display()));
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .and_then(|mut f| f.write_all(block.as_bytes()))
            .map_err(|e| RetentionError::WriteLog {
                path: log_path.clone(),
                source: e,
            })?;

        Ok(log_path)
    }
}

/// Deletes the files directly inside `directory` last modified strictly
/// before `cutoff`. Unreadable entries are logged and skipped.
fn sweep_directory(directory: &Path, cutoff: SystemTime) -> Vec<PathBuf> {
    let mut deleted = Vec::new();

    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping {}: {}", directory.display(), e);
            return deleted;
        }
    };

    debug!("Sweeping {}", directory.display());
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let modified = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta.modified(),
            Ok(_) => continue,
            Err(e) => Err(e),
        };

        match modified {
            Ok(modified) if modified < cutoff => match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Deleted {}", path.display());
                    deleted.push(path);
                }
                Err(e) => warn!("Could not delete {}: {}", path.display(), e),
            },
            Ok(_) => {}
            Err(e) => warn!("Could not stat {}: {}", path.display(), e),
        }
    }

    deleted
}
