/// Span/Log attribute keys for chat turns.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_ASSISTANT_ID: &str = "assistant.id";
pub const KEY_REQUEST_ID: &str = "req.id"; // caller-supplied correlation id
pub const KEY_ENDPOINT_REQUEST_ID: &str = "endpoint.req_id";

pub const KEY_LATENCY_MS: &str = "latency.ms";
pub const KEY_OUTCOME: &str = "stream.outcome";
pub const KEY_TOKENS: &str = "stream.tokens";
pub const KEY_FRAMES_SKIPPED: &str = "stream.frames_skipped";

/// Error-related (if applicable)
pub const KEY_ERROR_KIND: &str = "error.kind";
pub const KEY_ERROR_MESSAGE: &str = "error.message";
