use std::path::PathBuf;

use crate::reconciler::ReconcileOutcome;
use crate::retention::SweepOutcome;
use crate::scanner::ScanOutcome;
use crate::storage::ArchiveOutcome;
use crate::validator::BatchValidation;

use super::progress::Stage;

/// What each stage of a run produced so far.
pub struct RunContext {
    /// The stage currently executing, or the last one reached.
    pub stage: Stage,

    pub sweep: Option<SweepOutcome>,

    pub scan: Option<ScanOutcome>,

    pub validation: Option<BatchValidation>,

    // Written only when the invalid batch is non-empty
    pub invalid_log_path: Option<PathBuf>,

    pub reconcile: Option<ReconcileOutcome>,

    pub archive: Option<ArchiveOutcome>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            stage: Stage::Sweep,
            sweep: None,
            scan: None,
            validation: None,
            invalid_log_path: None,
            reconcile: None,
            archive: None,
        }
    }

    pub fn enter(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn manifest_len(&self) -> usize {
        self.scan.as_ref().map(|s| s.manifest.len()).unwrap_or(0)
    }

    pub fn valid_count(&self) -> usize {
        self.validation.as_ref().map(|v| v.valid.len()).unwrap_or(0)
    }

    pub fn invalid_count(&self) -> usize {
        self.validation.as_ref().map(|v| v.invalid.len()).unwrap_or(0)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
