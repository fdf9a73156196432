use log::error;
use std::sync::Mutex;

use crate::error::AppError;

/// Sink for failures that were absorbed instead of failing a request.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &AppError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorReporter;

impl ErrorReporter for LogErrorReporter {
    fn report(&self, context: &str, error: &AppError) {
        error!("[{}] absorbed failure: {}", context, error);
    }
}

/// Keeps every report in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingErrorReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn contexts(&self) -> Vec<String> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(context, _)| context.clone())
            .collect()
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn report(&self, context: &str, error: &AppError) {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((context.to_string(), error.to_string()));
    }
}
