use std::sync::Mutex;

use tracing::{error, info, warn};

use crate::context::messages::NotifyLevel;

/// Toast side channel. Display itself happens elsewhere.
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str, level: NotifyLevel);
}

/// Sends notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, text: &str, level: NotifyLevel) {
        match level {
            NotifyLevel::Info => info!(notification = text),
            NotifyLevel::Warning => warn!(notification = text),
            NotifyLevel::Error => error!(notification = text),
        }
    }
}

/// Keeps every notification for later inspection.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotifyLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(NotifyLevel, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, text: &str, level: NotifyLevel) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, text.to_string()));
        }
    }
}
