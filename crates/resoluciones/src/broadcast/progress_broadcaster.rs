//! Latest-value progress channel (0-100).

use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub stage: String,
}

/// Only the most recent value matters to a progress bar, so this uses a
/// `watch` channel: slow readers skip intermediate updates.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    sender: watch::Sender<ProgressSnapshot>,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ProgressSnapshot::default());
        Self { sender }
    }

    pub fn set(&self, percent: u8, stage: &str) {
        self.sender.send_replace(ProgressSnapshot {
            percent: percent.min(100),
            stage: stage.to_string(),
        });
    }

    pub fn current(&self) -> ProgressSnapshot {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
