//! Splits a staged batch into documents to ingest and names to report.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local};
use tracing::{debug, info, warn};

use crate::document::{classify_with_year, InvalidDocument, ParsedDocument};
use crate::error::StorageError;
use crate::scanner::absolutize;

pub const INVALID_LOG_FILENAME: &str = "log_errores.txt";

/// A classified document together with its staging copy.
#[derive(Debug, Clone)]
pub struct ValidDocument {
    pub document: ParsedDocument,
    pub staged_path: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchValidation {
    pub valid: Vec<ValidDocument>,
    pub invalid: Vec<InvalidDocument>,
    /// Entries under the backup directory, left over from an earlier run.
    pub excluded: Vec<PathBuf>,
    /// Entries no longer present in staging.
    pub missing: Vec<PathBuf>,
}

/// Classifies every manifest entry against the current year.
pub fn validate(entries: &[PathBuf], backup_dir: &Path) -> BatchValidation {
    validate_with_year(entries, backup_dir, Local::now().year())
}

pub fn validate_with_year(
    entries: &[PathBuf],
    backup_dir: &Path,
    current_year: i32,
) -> BatchValidation {
    let backup_dir = absolutize(backup_dir);
    let mut batch = BatchValidation::default();

    for path in entries {
        if absolutize(path).starts_with(&backup_dir) {
            warn!("Skipping {}: it lives in the backup directory", path.display());
            batch.excluded.push(path.clone());
            continue;
        }

        let Some(filename) = path.file_name().map(|n| n.to_string_lossy()) else {
            warn!("Skipping {}: no filename", path.display());
            batch.missing.push(path.clone());
            continue;
        };

        if !path.exists() {
            warn!("Skipping {}: no longer in staging", path.display());
            batch.missing.push(path.clone());
            continue;
        }

        match classify_with_year(&filename, current_year) {
            Ok(document) => {
                debug!(
                    "Valid: category={} sequence={} year={}",
                    document.category, document.sequence_id, document.year_token()
                );
                batch.valid.push(ValidDocument {
                    document,
                    staged_path: path.clone(),
                });
            }
            Err(invalid) => {
                debug!("Invalid: {} ({})", invalid.filename, invalid.reason);
                batch.invalid.push(invalid);
            }
        }
    }

    info!(
        "Validated {} entries: {} valid, {} invalid",
        entries.len(),
        batch.valid.len(),
        batch.invalid.len()
    );
    batch
}

/// Appends a timestamped block listing `invalid` to the cumulative error log
/// in `log_dir` and returns the log path.
pub fn write_invalid_log(
    log_dir: &Path,
    invalid: &[InvalidDocument],
) -> Result<PathBuf, StorageError> {
    std::fs::create_dir_all(log_dir).map_err(|e| StorageError::CreateDirectory {
        path: log_dir.to_path_buf(),
        source: e,
    })?;

    let log_path = log_dir.join(INVALID_LOG_FILENAME);
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");

    let mut block = format!("\nErrores encontrados el: {}\n", timestamp);
    for doc in invalid {
        block.push_str(&format!("- {} ({})\n", doc.filename, doc.reason));
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .and_then(|mut f| f.write_all(block.as_bytes()))
        .map_err(|e| StorageError::WriteFile {
            path: log_path.clone(),
            source: e,
        })?;

    info!(
        "Recorded {} invalid filenames in {}",
        invalid.len(),
        log_path.display()
    );
    Ok(log_path)
}
