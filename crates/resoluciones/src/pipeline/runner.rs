use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};

use tracing::{error, info, info_span, warn};

use crate::broadcast::LogLevel;
use crate::config::Config;
use crate::error::{ResolucionesError, RetentionError};
use crate::processor::{PdfTextExtractor, TextExtractor};
use crate::reconciler::Reconciler;
use crate::retention::RetentionSweeper;
use crate::sanitize;
use crate::scanner::{self, manifest_path, DirectoryScanner};
use crate::storage::Archiver;
use crate::validator;

use super::context::RunContext;
use super::progress::{ProgressReporter, Stage};
use super::report::RunReport;

/// Runs the intake end to end: sweep, scan, validate, reconcile, archive,
/// then report. Stages run strictly in sequence on the calling thread.
pub struct Pipeline {
    config: Arc<Config>,
    extractor: Arc<dyn TextExtractor>,
}

impl Pipeline {
    /// Production constructor, extracting text with lopdf.
    pub fn from_config(config: Arc<Config>) -> Self {
        Self::with_extractor(config, Arc::new(PdfTextExtractor))
    }

    pub fn with_extractor(config: Arc<Config>, extractor: Arc<dyn TextExtractor>) -> Self {
        Self { config, extractor }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes one run. Never panics and never returns an error: stage
    /// failures and panics alike become a failed [`RunReport`].
    pub fn run(&self, progress: &dyn ProgressReporter) -> RunReport {
        let _pipeline_span = info_span!(
            "pipeline",
            source = %sanitize::redact_share(&self.config.source_dir),
            target = %sanitize::redact_share(&self.config.target_dir),
        )
        .entered();

        install_trace_hook();
        take_panic_trace();

        let mut ctx = RunContext::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(&mut ctx, progress)
        }));

        let report = match outcome {
            Ok(Ok(())) => RunReport::from_context(&ctx),
            Ok(Err(e)) => {
                error!(stage = %ctx.stage, error = ?e, "Run aborted");
                progress.log(
                    LogLevel::Error,
                    &format!("Run aborted during {}: {}", ctx.stage, e),
                );
                RunReport::from_context(&ctx).with_error(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let trace = take_panic_trace().unwrap_or_else(|| "no trace captured".to_string());
                error!(stage = %ctx.stage, trace = %trace, "Run crashed: {}", message);
                progress.log(
                    LogLevel::Error,
                    &format!("Unexpected failure during {}: {}", ctx.stage, message),
                );
                RunReport::failed(message)
            }
        };

        self.step_report(&ctx, &report, progress);
        report
    }

    fn run_stages(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        {
            let _step = info_span!("sweep").entered();
            ctx.enter(Stage::Sweep);
            self.step_sweep(ctx, progress)?;
            self.milestone(Stage::Sweep, progress);
        }

        {
            let _step = info_span!("scan").entered();
            ctx.enter(Stage::Scan);
            self.step_scan(ctx, progress)?;
            self.milestone(Stage::Scan, progress);
        }
        if ctx.manifest_len() == 0 {
            warn!("Nothing to process");
            progress.log(LogLevel::Warn, "No files to process");
            return Ok(());
        }

        {
            let _step = info_span!("validate").entered();
            ctx.enter(Stage::Validate);
            self.step_validate(ctx, progress)?;
            self.milestone(Stage::Validate, progress);
        }
        if ctx.valid_count() == 0 {
            warn!("No valid files in this batch");
            progress.log(LogLevel::Warn, "No valid files to process");
            return Ok(());
        }

        {
            let _step = info_span!("reconcile").entered();
            ctx.enter(Stage::Reconcile);
            self.step_reconcile(ctx, progress)?;
            self.milestone(Stage::Reconcile, progress);
        }

        {
            let _step = info_span!("archive").entered();
            ctx.enter(Stage::Archive);
            self.step_archive(ctx, progress)?;
        }

        Ok(())
    }

    fn step_sweep(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        for dir in [&self.config.processed_dir, &self.config.backup_dir] {
            std::fs::create_dir_all(dir).map_err(|e| RetentionError::CreateDirectory {
                path: dir.clone(),
                source: e,
            })?;
        }

        let sweeper = RetentionSweeper::new(
            vec![
                self.config.temp_dir.clone(),
                self.config.backup_dir.clone(),
                self.config.processed_dir.clone(),
            ],
            self.config.cleanup_days,
            &self.config.processed_dir,
        );
        let outcome = sweeper.sweep()?;

        if outcome.deleted_count() > 0 {
            progress.log(
                LogLevel::Info,
                &format!(
                    "Deleted {} files older than {} days",
                    outcome.deleted_count(),
                    self.config.cleanup_days
                ),
            );
        }
        ctx.sweep = Some(outcome);
        Ok(())
    }

    fn step_scan(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        progress.log(LogLevel::Info, "Copying files from the intake share...");
        let scanner = DirectoryScanner::new(&self.config.source_dir, &self.config.temp_dir);
        let outcome = scanner.scan(&manifest_path(&self.config.processed_dir))?;

        for failure in &outcome.failures {
            progress.log(
                LogLevel::Warn,
                &format!(
                    "Could not copy {}: {}",
                    failure.source_path.display(),
                    failure.error
                ),
            );
        }
        progress.log(
            LogLevel::Info,
            &format!("{} files staged", outcome.manifest.len()),
        );
        ctx.scan = Some(outcome);
        Ok(())
    }

    fn step_validate(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        // The persisted manifest is the record of what this run owns.
        let manifest = scanner::load_manifest(&manifest_path(&self.config.processed_dir))?;
        let validation = validator::validate(&manifest.entries, &self.config.backup_dir);

        for invalid in &validation.invalid {
            progress.log(
                LogLevel::Warn,
                &format!("Invalid filename {}: {}", invalid.filename, invalid.reason),
            );
        }
        if !validation.invalid.is_empty() {
            let log_path =
                validator::write_invalid_log(&self.config.processed_dir, &validation.invalid)?;
            ctx.invalid_log_path = Some(log_path);
        }

        info!(
            valid = validation.valid.len(),
            invalid = validation.invalid.len(),
            excluded = validation.excluded.len(),
            missing = validation.missing.len(),
            "Batch validated"
        );
        progress.log(
            LogLevel::Info,
            &format!(
                "{} valid, {} invalid",
                validation.valid.len(),
                validation.invalid.len()
            ),
        );
        ctx.validation = Some(validation);
        Ok(())
    }

    fn step_reconcile(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        let batch = ctx
            .validation
            .as_ref()
            .map(|v| v.valid.as_slice())
            .unwrap_or_default();

        progress.log(LogLevel::Info, "Updating the records database...");
        let reconciler = Reconciler::new(&self.config.database.path, Arc::clone(&self.extractor));
        let outcome = reconciler.reconcile(batch)?;

        for failure in &outcome.extraction_failures {
            progress.log(
                LogLevel::Warn,
                &format!(
                    "Text not extracted from {}: {}",
                    sanitize::redact_path(&failure.staged_path),
                    failure.error
                ),
            );
        }
        progress.log(
            LogLevel::Info,
            &format!(
                "{} records created, {} updated",
                outcome.inserted, outcome.updated
            ),
        );
        ctx.reconcile = Some(outcome);
        Ok(())
    }

    fn step_archive(
        &self,
        ctx: &mut RunContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), ResolucionesError> {
        let batch = ctx
            .validation
            .as_ref()
            .map(|v| v.valid.as_slice())
            .unwrap_or_default();

        progress.log(LogLevel::Info, "Archiving files...");
        let archiver = Archiver::new(
            &self.config.backup_dir,
            &self.config.target_dir,
            &self.config.processed_dir,
            &self.config.source_dir,
        );
        let outcome = archiver.archive(batch)?;

        for failure in &outcome.failures {
            progress.log(
                LogLevel::Error,
                &format!("Could not archive {}: {}", failure.filename, failure.error),
            );
        }
        progress.log(
            LogLevel::Info,
            &format!(
                "{} files archived, processing log at {}",
                outcome.entries.len(),
                outcome.log_path.display()
            ),
        );
        ctx.archive = Some(outcome);
        Ok(())
    }

    /// Always runs, whatever happened before.
    fn step_report(&self, ctx: &RunContext, report: &RunReport, progress: &dyn ProgressReporter) {
        let _step = info_span!("report").entered();
        info!(
            success = report.success,
            staged = ctx.manifest_len(),
            valid = ctx.valid_count(),
            invalid = ctx.invalid_count(),
            deleted = report.deleted_count,
            "Run finished"
        );
        let level = if report.success {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };
        progress.log(
            level,
            if report.success {
                "Process finished"
            } else {
                "Process finished without archiving any file"
            },
        );
        self.milestone(Stage::Report, progress);
    }

    fn milestone(&self, stage: Stage, progress: &dyn ProgressReporter) {
        progress.progress(self.config.progress_step(stage.milestone()), stage);
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static TRACE_HOOK: Once = Once::new();

/// Chains a hook in front of the current one that keeps the location and
/// backtrace of the last panic on this thread.
fn install_trace_hook() {
    TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown location".to_string());
            let trace = format!("at {}\n{}", location, Backtrace::force_capture());
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn take_panic_trace() -> Option<String> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
