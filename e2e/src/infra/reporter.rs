//! `ProgressReporter` backed by `tracing`.

use crate::application::ports::ProgressReporter;

/// Forwards engine progress to the `e2e_env::progress` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn step(&self, message: &str) {
        tracing::info!(target: "e2e_env::progress", "{message}");
    }

    fn success(&self, message: &str) {
        tracing::info!(target: "e2e_env::progress", ok = true, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "e2e_env::progress", "{message}");
    }
}
