use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::broadcast::{LogBroadcaster, LogLevel, ProgressBroadcaster};

/// Stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Sweep,
    Scan,
    Validate,
    Reconcile,
    Archive,
    Report,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sweep => "sweep",
            Stage::Scan => "scan",
            Stage::Validate => "validate",
            Stage::Reconcile => "reconcile",
            Stage::Archive => "archive",
            Stage::Report => "report",
        }
    }

    /// Index into the configured progress milestones. Archiving shares the
    /// reconcile milestone.
    pub fn milestone(&self) -> usize {
        match self {
            Stage::Sweep => 0,
            Stage::Scan => 1,
            Stage::Validate => 2,
            Stage::Reconcile | Stage::Archive => 3,
            Stage::Report => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the pipeline for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Log { level: LogLevel, message: String },
    Progress { percent: u8, stage: Stage },
}

/// One-way sink for run logs and progress. Implementations must not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);

    fn log(&self, level: LogLevel, message: &str) {
        self.report(ProgressEvent::Log {
            level,
            message: message.to_string(),
        });
    }

    fn progress(&self, percent: u8, stage: Stage) {
        self.report(ProgressEvent::Progress { percent, stage });
    }
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to `tracing`, for headless runs.
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Log { level, message } => match level {
                LogLevel::Error => error!("{}", message),
                LogLevel::Warn => warn!("{}", message),
                LogLevel::Info => info!("{}", message),
                LogLevel::Debug => debug!("{}", message),
            },
            ProgressEvent::Progress { percent, stage } => {
                info!(percent, stage = %stage, "Progress {}%", percent);
            }
        }
    }
}

/// Bridges pipeline events to the broadcast channels a UI subscribes to.
pub struct BroadcastProgress {
    logs: LogBroadcaster,
    progress: ProgressBroadcaster,
}

impl BroadcastProgress {
    pub fn new(logs: LogBroadcaster, progress: ProgressBroadcaster) -> Self {
        Self { logs, progress }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Log { level, message } => self.logs.log(level, &message),
            ProgressEvent::Progress { percent, stage } => {
                self.progress.set(percent, stage.as_str())
            }
        }
    }
}
