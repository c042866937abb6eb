use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::context::RunContext;

/// Outcome of one pipeline execution handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub success: bool,
    /// Processing log (`registro_<timestamp>.txt`), present once archiving ran.
    pub registro_path: Option<PathBuf>,
    pub invalid_log_path: Option<PathBuf>,
    pub cleanup_log_path: Option<PathBuf>,
    pub deleted_count: usize,
    pub error: Option<String>,
}

impl RunReport {
    /// Builds the report from whatever the stages produced. A run that
    /// archived nothing is not a success.
    pub fn from_context(ctx: &RunContext) -> Self {
        Self {
            success: ctx.archive.is_some(),
            registro_path: ctx.archive.as_ref().map(|a| a.log_path.clone()),
            invalid_log_path: ctx.invalid_log_path.clone(),
            cleanup_log_path: ctx.sweep.as_ref().and_then(|s| s.log_path.clone()),
            deleted_count: ctx.sweep.as_ref().map(|s| s.deleted_count()).unwrap_or(0),
            error: None,
        }
    }

    /// Keeps the log paths produced before `error` stopped the run.
    pub fn with_error(mut self, error: String) -> Self {
        self.success = false;
        self.error = Some(error);
        self
    }

    /// Zeroed report for a run that crashed.
    pub fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Run {}",
            if self.success { "succeeded" } else { "failed" }
        )?;
        if let Some(ref path) = self.registro_path {
            writeln!(f, "  processing log: {}", path.display())?;
        }
        if let Some(ref path) = self.invalid_log_path {
            writeln!(f, "  invalid filenames: {}", path.display())?;
        }
        if let Some(ref path) = self.cleanup_log_path {
            writeln!(f, "  cleanup log: {}", path.display())?;
        }
        write!(f, "  files deleted by retention: {}", self.deleted_count)?;
        if let Some(ref error) = self.error {
            write!(f, "\n  error: {}", error)?;
        }
        Ok(())
    }
}
