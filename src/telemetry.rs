//! Telemetry utilities for operation timing and request correlation.

use std::time::Instant;

/// Guard for timing an orchestrator operation and recording metrics.
///
/// Records latency and outcome when dropped. The outcome defaults to
/// `"aborted"` so a future dropped mid-flight is still counted.
pub struct OperationTimer {
    op: &'static str,
    outcome: &'static str,
    start: Instant,
}

impl OperationTimer {
    /// Start timing an operation.
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            outcome: "aborted",
            start: Instant::now(),
        }
    }

    /// Set the outcome label recorded on drop.
    pub fn finish(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_operation(self.op, self.outcome, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create the root span for one inbound request.
    pub fn request(request_id: &str) -> Span {
        info_span!("request", request_id = %request_id)
    }

    /// Create a span for one orchestrator operation.
    pub fn operation(parent: &Span, op: &'static str) -> Span {
        tracing::info_span!(parent: parent, "op", op = op)
    }
}

/// Shorten a secret for logs: the first four characters and the length.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{}…({})", prefix, secret.chars().count())
}
