//! Named spans for the three suspension points the deliberation engine
//! instruments: backend invocation, tool execution, and graph writes.

use std::future::Future;
use tracing::{info_span, Instrument, Span};

/// Span around one backend `invoke()` call.
pub fn backend_invocation_span(backend_id: &str, model_id: &str, round: u32, participant: &str) -> Span {
    info_span!(
        "backend_invocation",
        backend = %backend_id,
        model = %model_id,
        round = %round,
        participant = %participant,
    )
}

/// Span around one tool-executor dispatch.
pub fn tool_execution_span(tool_name: &str, operation_id: &str) -> Span {
    info_span!("tool_execution", tool = %tool_name, operation_id = %operation_id)
}

/// Span around one decision-graph write.
pub fn graph_write_span(decision_id: &str) -> Span {
    info_span!("graph_write", decision_id = %decision_id)
}

/// Instrument a future with a span.
pub fn instrument_future<F: Future>(future: F, span: Span) -> impl Future<Output = F::Output> {
    future.instrument(span)
}

/// Record an error on the current span.
pub fn record_error(error: &dyn std::error::Error) {
    Span::current().record("error", tracing::field::display(error));
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
    }
}

/// Macro for timing a block of code.
#[macro_export]
macro_rules! timed {
    ($name:expr, $body:expr) => {{
        let _timer = $crate::spans::Timer::start($name);
        let result = $body;
        _timer.finish();
        result
    }};
}

pub use tracing::instrument;

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::EnvFilter;

    fn with_subscriber<F>(f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(EnvFilter::new("trace"))
            .finish();

        tracing::subscriber::with_default(subscriber, f);
    }

    #[test]
    fn spans_nest_backend_then_tool() {
        with_subscriber(|| {
            let backend = backend_invocation_span("claude", "opus", 1, "opus@claude");
            let _guard1 = backend.enter();

            let tool = tool_execution_span("read_file", "op_1");
            let _guard2 = tool.enter();

            tracing::info!("nested operation");
        });
    }

    #[test]
    fn graph_write_span_records_decision_id() {
        with_subscriber(|| {
            let span = graph_write_span("dec_123");
            let _guard = span.enter();
            tracing::info!("persisted decision");
        });
    }

    #[tokio::test]
    async fn context_propagates_across_async_boundary() {
        let backend = backend_invocation_span("claude", "opus", 1, "opus@claude");

        let future = async {
            tracing::info!("invoking backend");

            let tool = tool_execution_span("code_search", "op_2");
            let inner = async {
                tracing::info!("executing tool");
            };

            instrument_future(inner, tool).await;
        };

        instrument_future(future, backend).await;
    }

    #[test]
    fn timer_emits_duration_on_finish() {
        let timer = Timer::start("similarity_scoring");
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.finish();

        with_subscriber(|| {
            let result = timed!("macro_test", {
                std::thread::sleep(std::time::Duration::from_millis(1));
                "success"
            });

            assert_eq!(result, "success");
        });
    }
}
