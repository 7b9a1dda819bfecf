use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::sensors::FeedbackSink;

/// Feedback for headless runs: a log line per notification.
#[derive(Debug, Default)]
pub struct LogFeedback {
    sent: AtomicU64,
}

impl LogFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl FeedbackSink for LogFeedback {
    fn success(&self) {
        let count = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!("✓ Success ({})", count);
    }
}
