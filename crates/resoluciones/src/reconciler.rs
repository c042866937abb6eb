//! Brings the records database in line with a validated batch.
//!
//! Four phases, each committed before the next starts:
//!
//! 1. stage: reset the staging tables and load one filename per document
//! 2. transform: slice the key triples out of the staged filenames
//! 3. upsert: create master rows for keys that have none
//! 4. backfill: extract each document's text into its master row(s). This
//!    covers the whole batch, including names too wide to stage, so a key
//!    whose row already exists still gets its text.
//!
//! A database failure in phases 1-3 aborts the whole call. Phase 4 works
//! file by file and never aborts: a document whose text cannot be extracted
//! keeps its placeholder until a later run succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::db::intake_repo::{self, IntakeFileRow};
use crate::db::maestro_repo;
use crate::db::{Database, DatabaseError};
use crate::error::ReconcileError;
use crate::processor::TextExtractor;
use crate::validator::ValidDocument;

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Rows loaded into the staging table.
    pub staged: usize,
    /// Documents whose names do not fit the fixed-width layout.
    pub not_staged: Vec<String>,
    /// Master rows created in phase 3.
    pub inserted: usize,
    /// Master rows whose text was backfilled in phase 4.
    pub updated: usize,
    pub extraction_failures: Vec<BackfillFailure>,
    /// Documents with no master row to update.
    pub unmatched: Vec<String>,
}

#[derive(Debug)]
pub struct BackfillFailure {
    pub staged_path: PathBuf,
    pub error: String,
}

pub struct Reconciler {
    database_path: PathBuf,
    extractor: Arc<dyn TextExtractor>,
}

impl Reconciler {
    pub fn new<P: AsRef<Path>>(database_path: P, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            database_path: database_path.as_ref().to_path_buf(),
            extractor,
        }
    }

    /// Opens the database for the duration of this call and runs all four
    /// phases against `batch`.
    pub fn reconcile(&self, batch: &[ValidDocument]) -> Result<ReconcileOutcome, ReconcileError> {
        let db = Database::open(&self.database_path)?;
        self.reconcile_with(&db, batch)
    }

    /// Runs the four phases against an already open database.
    pub fn reconcile_with(
        &self,
        db: &Database,
        batch: &[ValidDocument],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut outcome = ReconcileOutcome::default();

        let stageable: Vec<&ValidDocument> = batch
            .iter()
            .filter(|doc| {
                let fits = doc.document.fits_fixed_width();
                if !fits {
                    warn!(
                        "Not staging {}: name does not fit the fixed-width layout",
                        doc.document.original_filename
                    );
                    outcome
                        .not_staged
                        .push(doc.document.original_filename.clone());
                }
                fits
            })
            .collect();

        {
            let _phase = info_span!("stage").entered();
            outcome.staged = db
                .transaction(|conn| {
                    intake_repo::clear(conn)?;
                    for doc in &stageable {
                        let row = IntakeFileRow {
                            archivo: doc.document.staged_filename(),
                        };
                        debug!("Staging {}", row.archivo);
                        intake_repo::insert_file(conn, &row)?;
                    }
                    Ok(stageable.len())
                })
                .map_err(phase_error("stage"))?;
            info!("Staged {} filenames", outcome.staged);
        }

        {
            let _phase = info_span!("transform").entered();
            let derived = db
                .transaction(intake_repo::derive_keys)
                .map_err(phase_error("transform"))?;
            info!("Derived {} keys", derived);
        }

        {
            let _phase = info_span!("upsert").entered();
            outcome.inserted = db
                .transaction(maestro_repo::insert_missing_from_keys)
                .map_err(phase_error("upsert"))?;
            info!("Created {} master rows", outcome.inserted);
        }

        {
            let _phase = info_span!("backfill").entered();
            for doc in batch {
                self.backfill_one(db, doc, &mut outcome);
            }
            info!(
                "Backfilled {} master rows, {} extraction failures",
                outcome.updated,
                outcome.extraction_failures.len()
            );
        }

        Ok(outcome)
    }

    fn backfill_one(&self, db: &Database, doc: &ValidDocument, outcome: &mut ReconcileOutcome) {
        let text = match self.extractor.extract_text(&doc.staged_path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Text extraction failed for {}: {}", doc.staged_path.display(), e);
                outcome.extraction_failures.push(BackfillFailure {
                    staged_path: doc.staged_path.clone(),
                    error: e.to_string(),
                });
                return;
            }
        };

        let (letra, actuacion, ejercicio) = doc.document.key();
        let updated = db.transaction(|conn| {
            let rows = maestro_repo::find_by_key(conn, &letra, &actuacion, &ejercicio)?;
            let mut updated = 0;
            for row in rows {
                let extracto = maestro_repo::merge_extracto(row.extracto.as_deref(), &text);
                updated += maestro_repo::update_extracto(conn, row.id, &extracto)?;
            }
            Ok(updated)
        });

        match updated {
            Ok(0) => {
                warn!(
                    "No master row for {}",
                    doc.document.original_filename
                );
                outcome.unmatched.push(doc.document.original_filename.clone());
            }
            Ok(count) => {
                debug!("Updated {} rows for {}", count, doc.document.original_filename);
                outcome.updated += count;
            }
            Err(e) => {
                warn!(
                    "Could not update master row for {}: {}",
                    doc.document.original_filename, e
                );
                outcome.extraction_failures.push(BackfillFailure {
                    staged_path: doc.staged_path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
}

fn phase_error(phase: &'static str) -> impl Fn(DatabaseError) -> ReconcileError {
    move |source| ReconcileError::Phase { phase, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::classify_with_year;
    use crate::error::ExtractionError;
    use tempfile::TempDir;

    fn doc(dir: &Path, name: &str) -> ValidDocument {
        let staged_path = dir.join(name);
        std::fs::write(&staged_path, b"pdf").unwrap();
        ValidDocument {
            document: classify_with_year(name, 2026).unwrap(),
            staged_path,
        }
    }

    fn fixed_text(text: &'static str) -> Arc<dyn TextExtractor> {
        Arc::new(move |_: &Path| -> Result<String, ExtractionError> { Ok(text.to_string()) })
    }

    fn failing() -> Arc<dyn TextExtractor> {
        Arc::new(|path: &Path| -> Result<String, ExtractionError> {
            Err(ExtractionError::PdfParse {
                path: path.to_path_buf(),
                message: "damaged".to_string(),
            })
        })
    }

    fn extracto(db: &Database, key: (&str, &str, &str)) -> Option<String> {
        db.with_conn(|conn| maestro_repo::find_by_key(conn, key.0, key.1, key.2))
            .unwrap()
            .into_iter()
            .next()
            .and_then(|row| row.extracto)
    }

    #[test]
    fn test_reconcile_creates_and_backfills() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let batch = vec![doc(temp_dir.path(), "1-000123-2024.pdf")];

        let outcome = Reconciler::new(temp_dir.path().join("unused.db"), fixed_text("RESUELVE"))
            .reconcile_with(&db, &batch)
            .unwrap();

        assert_eq!(outcome.staged, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.updated, 1);
        assert_eq!(
            extracto(&db, ("1", "000123", "2024")).as_deref(),
            Some("Reconocimiento optico de caracteres: RESUELVE")
        );
    }

    #[test]
    fn test_reconcile_twice_accumulates_text() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("gestion.db");
        let batch = vec![doc(temp_dir.path(), "1-000123-2024.pdf")];

        let first = Reconciler::new(&db_path, fixed_text("uno"))
            .reconcile(&batch)
            .unwrap();
        let second = Reconciler::new(&db_path, fixed_text("dos"))
            .reconcile(&batch)
            .unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 1);

        let db = Database::open(&db_path).unwrap();
        let text = extracto(&db, ("1", "000123", "2024")).unwrap();
        assert_eq!(text, "Reconocimiento optico de caracteres: uno dos");
        assert_eq!(text.matches(maestro_repo::EXTRACTION_MARKER).count(), 1);
    }

    #[test]
    fn test_extraction_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let batch = vec![doc(temp_dir.path(), "2-000456-2023.pdf")];

        let outcome = Reconciler::new(temp_dir.path().join("unused.db"), failing())
            .reconcile_with(&db, &batch)
            .unwrap();

        assert_eq!(outcome.updated, 0);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.extraction_failures.len(), 1);
        assert_eq!(
            extracto(&db, ("2", "000456", "2023")),
            Some(maestro_repo::placeholder_extracto())
        );
    }

    #[test]
    fn test_non_fixed_width_names_are_not_staged() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let batch = vec![
            doc(temp_dir.path(), "12-000123-2024.pdf"),
            doc(temp_dir.path(), "1-000124-2024.pdf"),
        ];

        let outcome = Reconciler::new(temp_dir.path().join("unused.db"), fixed_text("t"))
            .reconcile_with(&db, &batch)
            .unwrap();

        assert_eq!(outcome.not_staged, vec!["12-000123-2024.pdf".to_string()]);
        assert_eq!(outcome.staged, 1);
        assert_eq!(outcome.updated, 1);
    }

    #[test]
    fn test_wide_names_are_backfilled_into_existing_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO maestro
                    (boca, letra, actuacion, ejercicio, apeynom, extracto, fech_alta,
                     estado, folio, origen_nomenc, subtramite)
                 VALUES (2, '1', '12345', '2020', 'RESOLUCION DE PRESIDENCIA', ?1,
                         '2020-01-01 00:00:00', 'N', 1, 100180, 900999)",
                [maestro_repo::placeholder_extracto()],
            )?;
            Ok(())
        })
        .unwrap();
        let batch = vec![doc(temp_dir.path(), "1-12345-2020.pdf")];

        let outcome = Reconciler::new(temp_dir.path().join("unused.db"), fixed_text("VISTO"))
            .reconcile_with(&db, &batch)
            .unwrap();

        assert_eq!(outcome.not_staged, vec!["1-12345-2020.pdf".to_string()]);
        assert_eq!(outcome.staged, 0);
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.updated, 1);
        assert_eq!(
            extracto(&db, ("1", "12345", "2020")).as_deref(),
            Some("Reconocimiento optico de caracteres: VISTO")
        );
    }

    #[test]
    fn test_staging_tables_reset_each_call() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let reconciler = Reconciler::new(temp_dir.path().join("unused.db"), fixed_text("t"));

        reconciler
            .reconcile_with(&db, &[doc(temp_dir.path(), "1-000001-2024.pdf")])
            .unwrap();
        reconciler
            .reconcile_with(&db, &[doc(temp_dir.path(), "1-000002-2024.pdf")])
            .unwrap();

        let files = db.with_conn(|conn| intake_repo::list_files(conn)).unwrap();
        assert_eq!(
            files,
            vec![IntakeFileRow {
                archivo: "1-000002-2024.pdf".to_string()
            }]
        );
    }

    #[test]
    fn test_unreachable_database_aborts() {
        let temp_dir = TempDir::new().unwrap();
        // A directory cannot be opened as a database file.
        let result = Reconciler::new(temp_dir.path(), fixed_text("t"))
            .reconcile(&[doc(temp_dir.path(), "1-000001-2024.pdf")]);
        assert!(result.is_err());
    }
}
