use serde::{Deserialize, Serialize};

/// One chat turn as supplied by the caller.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub assistant_id: String,
    pub message: String,
    /// Correlation id forwarded as `X-Request-Id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl StreamRequest {
    pub fn new(assistant_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ---- Wire body: {"input_data": {"question": "..."}} ----
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    pub input_data: InputData,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct InputData {
    pub question: String,
}

impl ChatPayload {
    pub fn question(message: impl Into<String>) -> Self {
        Self {
            input_data: InputData {
                question: message.into(),
            },
        }
    }
}

/// Final result of a turn, handed over exactly once on clean end of stream.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ChatResult {
    pub response_text: String,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
}
