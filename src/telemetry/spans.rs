//! Span utilities for task execution tracing.

use tracing::{info_span, Span};

use crate::scheduler::Device;
use crate::task::TaskOutcome;

/// Extension trait for recording task results into a span.
pub trait SpanExt {
    /// Record the outcome status (and failure reason, if any).
    fn record_outcome(&self, outcome: &TaskOutcome);
}

impl SpanExt for Span {
    fn record_outcome(&self, outcome: &TaskOutcome) {
        self.record("status", outcome.status());
        if let Some(reason) = outcome.failure_reason() {
            self.record("failure", tracing::field::display(reason));
        }
    }
}

/// Factory for standardized task spans.
pub struct TaskSpan;

impl TaskSpan {
    /// Span for one task execution inside a worker.
    ///
    /// `status`, `failure` and `elapsed_ms` are filled in after completion.
    pub fn new(task: &str, device: Device) -> Span {
        info_span!(
            "task",
            task = %task,
            device = %device,
            status = tracing::field::Empty,
            failure = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
        )
    }
}
