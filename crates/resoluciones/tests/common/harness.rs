//! Test harness for isolated pipeline runs.
//!
//! Every directory the pipeline touches (intake share, staging, processed,
//! backup, archive) and the database live in one temp dir.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use assert_fs::prelude::*;
use assert_fs::TempDir;

use resoluciones::config::Config;
use resoluciones::db::maestro_repo::{self, MaestroRow};
use resoluciones::db::Database;
use resoluciones::pipeline::{NoopProgress, Pipeline, ProgressReporter, RunReport};
use resoluciones::scanner::{self, Manifest};
use resoluciones::TextExtractor;

use super::builders::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    /// Create a harness with a customized configuration.
    pub fn with_config<F>(customize: F) -> Self
    where
        F: FnOnce(ConfigBuilder) -> ConfigBuilder,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = customize(ConfigBuilder::new(temp_dir.path())).build();
        Self { temp_dir, config }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Drop a file on the intake share, `relative` to its root.
    pub fn drop_in_share(&self, relative: &str, content: &[u8]) -> PathBuf {
        let child = self.temp_dir.child(
            self.config
                .source_dir
                .strip_prefix(self.temp_dir.path())
                .expect("source_dir lives in the temp dir")
                .join(relative),
        );
        if let Some(parent) = child.path().parent() {
            std::fs::create_dir_all(parent).expect("Failed to create share directory");
        }
        child.write_binary(content).expect("Failed to write share file");
        child.path().to_path_buf()
    }

    /// Write a file into `dir` and backdate its modification time.
    pub fn write_aged(&self, dir: &Path, filename: &str, age_days: u64) -> PathBuf {
        std::fs::create_dir_all(dir).expect("Failed to create directory");
        let path = dir.join(filename);
        std::fs::write(&path, b"old").expect("Failed to write aged file");
        let modified = SystemTime::now() - Duration::from_secs(age_days * 24 * 60 * 60);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .and_then(|f| f.set_modified(modified))
            .expect("Failed to backdate file");
        path
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_config(Arc::new(self.config.clone()))
    }

    pub fn pipeline_with(&self, extractor: Arc<dyn TextExtractor>) -> Pipeline {
        Pipeline::with_extractor(Arc::new(self.config.clone()), extractor)
    }

    /// Run the production pipeline once without progress output.
    pub fn run(&self) -> RunReport {
        self.pipeline().run(&NoopProgress)
    }

    pub fn run_with_progress(&self, progress: &dyn ProgressReporter) -> RunReport {
        self.pipeline().run(progress)
    }

    pub fn manifest(&self) -> Manifest {
        scanner::load_manifest(&scanner::manifest_path(&self.config.processed_dir))
            .expect("Failed to load manifest")
    }

    pub fn maestro_rows(&self, letra: &str, actuacion: &str, ejercicio: &str) -> Vec<MaestroRow> {
        let db = Database::open(&self.config.database.path).expect("Failed to open database");
        db.with_conn(|conn| maestro_repo::find_by_key(conn, letra, actuacion, ejercicio))
            .expect("Failed to query maestro")
    }

    pub fn archived(&self, year: &str, filename: &str) -> PathBuf {
        self.config.target_dir.join(year).join(filename)
    }

    pub fn backed_up(&self, filename: &str) -> PathBuf {
        self.config.backup_dir.join(filename)
    }

    /// Files left anywhere under the intake share.
    pub fn share_files(&self) -> Vec<PathBuf> {
        walkdir::WalkDir::new(&self.config.source_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect()
    }

    pub fn read(path: &Path) -> String {
        std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
    }
}
