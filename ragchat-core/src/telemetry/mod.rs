//! Per-turn telemetry for chat streams.
//!
//! A turn reports twice: a [`StreamTrace`] once the endpoint has answered with a
//! success status, and a [`CompletionLog`] at its terminal event. Both go to the
//! process-wide sink installed with [`set_telemetry_sink`]; without one, the events
//! are dropped. Span fields use the names in [`keys`].

pub mod keys;
pub mod types;
#[cfg(test)]
pub mod test_span;

pub use keys::*;
pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Receiver for turn telemetry. Called on the task driving the turn, between
/// callbacks, so it should return quickly.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record(&self, trace: StreamTrace);

    fn record_completion(&self, _log: CompletionLog) {}
}

static TELEMETRY_SINK: OnceCell<Arc<dyn TelemetrySink>> = OnceCell::new();

// Tests share one process-wide sink; only threads that opt in emit to it.
#[cfg(test)]
thread_local! {
    static TEST_CAPTURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install the sink for the rest of the process. Returns `false` if one is
/// already installed; the first sink stays.
pub fn set_telemetry_sink(sink: Arc<dyn TelemetrySink>) -> bool {
    TELEMETRY_SINK.set(sink).is_ok()
}

fn sink() -> Option<&'static Arc<dyn TelemetrySink>> {
    #[cfg(test)]
    {
        if !TEST_CAPTURE.with(|c| c.get()) {
            return None;
        }
    }
    TELEMETRY_SINK.get()
}

pub(crate) fn emit(trace: StreamTrace) {
    if let Some(sink) = sink() {
        sink.record(trace);
    }
}

pub(crate) fn emit_completion(log: CompletionLog) {
    if let Some(sink) = sink() {
        sink.record_completion(log);
    }
}

/// Let turns driven on the current thread reach the sink (tests only).
#[cfg(test)]
pub fn test_set_capture_enabled(enabled: bool) {
    TEST_CAPTURE.with(|c| c.set(enabled));
}
