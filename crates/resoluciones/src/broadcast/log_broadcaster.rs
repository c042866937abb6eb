//! Log broadcasting for real-time log streaming.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
        }
    }

    /// `[HH:MM:SS] LEVEL message`, the line format of the run log panel.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

#[derive(Clone)]
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEvent>,
}

impl LogBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: LogEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.send(LogEvent::new(level, message));
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
