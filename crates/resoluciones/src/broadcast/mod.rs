//! Broadcasting of run logs and progress to an external presentation layer.
//!
//! Both channels are one-way and never block the pipeline: a send with no
//! subscriber is dropped.

pub mod log_broadcaster;
pub mod progress_broadcaster;

pub use log_broadcaster::{LogBroadcaster, LogEvent, LogLevel};
pub use progress_broadcaster::{ProgressBroadcaster, ProgressSnapshot};
