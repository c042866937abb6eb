use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Flat settings object threaded into every stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Local staging area for copies of the intake files.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    /// Home of the manifest and every log the run produces.
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
    /// Flat backup copy of every archived file.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    /// Network intake share.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Year-partitioned archive root.
    #[serde(default = "default_target_dir")]
    pub target_dir: PathBuf,
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: u32,
    /// Advisory progress milestones, one per pipeline stage.
    #[serde(default = "default_progress_steps")]
    pub progress_steps: Vec<u8>,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            processed_dir: default_processed_dir(),
            backup_dir: default_backup_dir(),
            source_dir: default_source_dir(),
            target_dir: default_target_dir(),
            cleanup_days: default_cleanup_days(),
            progress_steps: default_progress_steps(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Milestone for the `stage`-th stage (0-based), clamped to the last
    /// configured step.
    pub fn progress_step(&self, stage: usize) -> u8 {
        self.progress_steps
            .get(stage)
            .or(self.progress_steps.last())
            .copied()
            .unwrap_or(100)
    }
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from(r"C:\Temp")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from(r"C:\Temp\Procesados")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(r"C:\Temp\Procesados\PDFs_BK")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(r"\\fs01\Resoluciones_Temp")
}

fn default_target_dir() -> PathBuf {
    PathBuf::from(r"\\fs01\Resoluciones")
}

fn default_cleanup_days() -> u32 {
    60
}

fn default_progress_steps() -> Vec<u8> {
    vec![10, 25, 50, 75, 100]
}

fn default_database_path() -> PathBuf {
    PathBuf::from("gestion.db")
}
