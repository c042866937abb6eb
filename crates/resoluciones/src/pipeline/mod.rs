pub mod context;
pub mod progress;
pub mod report;
pub mod runner;

pub use context::RunContext;
pub use progress::{
    BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter, Stage, TracingProgress,
};
pub use report::RunReport;
pub use runner::Pipeline;
