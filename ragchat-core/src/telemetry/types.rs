use serde::{Deserialize, Serialize};

/// Emitted once per turn when the endpoint has answered with a successful status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StreamTrace {
    pub assistant_id: Option<String>,

    /// Caller-supplied correlation id.
    pub request_id: Option<String>,

    /// Correlation id returned by the endpoint.
    pub endpoint_request_id: Option<String>,

    /// Transport name, e.g. "http".
    pub transport: Option<String>,

    pub status: Option<u16>,

    /// Time from request start until response headers arrived.
    pub time_to_headers_ms: Option<u64>,
}

impl StreamTrace {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn assistant_id(mut self, id: &str) -> Self {
        self.assistant_id = Some(id.to_string());
        self
    }
    pub fn request_id_opt(mut self, rid: Option<&str>) -> Self {
        self.request_id = rid.map(|s| s.to_string());
        self
    }
    pub fn endpoint_request_id_opt<S: AsRef<str>>(mut self, erid: Option<S>) -> Self {
        self.endpoint_request_id = erid.map(|s| s.as_ref().to_string());
        self
    }
    pub fn transport(mut self, name: &str) -> Self {
        self.transport = Some(name.to_string());
        self
    }
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
    pub fn time_to_headers_ms(mut self, ms: u64) -> Self {
        self.time_to_headers_ms = Some(ms);
        self
    }
}

/// Structured event emitted at the terminal point of every turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionLog {
    pub assistant_id: Option<String>,
    pub request_id: Option<String>,
    pub endpoint_request_id: Option<String>,
    pub latency_ms: Option<u64>,

    /// "complete" or "error".
    pub outcome: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,

    pub tokens: Option<u64>,
    pub frames_skipped: Option<u64>,
    pub response_chars: Option<u64>,
    pub contexts: Option<u32>,
    pub source_urls: Option<u32>,
}

impl CompletionLog {
    pub fn new() -> Self { Self::default() }
    pub fn assistant_id(mut self, v: &str) -> Self { self.assistant_id = Some(v.to_string()); self }
    pub fn request_id_opt(mut self, v: Option<&str>) -> Self { self.request_id = v.map(|s| s.to_string()); self }
    pub fn endpoint_request_id_opt(mut self, v: Option<&str>) -> Self { self.endpoint_request_id = v.map(|s| s.to_string()); self }
    pub fn latency_ms(mut self, v: u64) -> Self { self.latency_ms = Some(v); self }
    pub fn outcome(mut self, v: &str) -> Self { self.outcome = Some(v.to_string()); self }
    pub fn error(mut self, kind: &str, message: &str) -> Self {
        self.error_kind = Some(kind.to_string());
        self.error_message = Some(message.to_string());
        self
    }
    pub fn counts(mut self, tokens: u64, frames_skipped: u64) -> Self {
        self.tokens = Some(tokens); self.frames_skipped = Some(frames_skipped); self
    }
    pub fn result_shape(mut self, response_chars: u64, contexts: u32, source_urls: u32) -> Self {
        self.response_chars = Some(response_chars);
        self.contexts = Some(contexts);
        self.source_urls = Some(source_urls);
        self
    }
}
