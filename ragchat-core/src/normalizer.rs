use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ChatStreamError, CoreResult};
use crate::model::StreamRequest;

// Unreserved URI characters only; the id is interpolated into a path segment.
static ASSISTANT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._~-]+$").expect("static regex"));

/// Validate the target. The message goes on the wire exactly as given, empty
/// included; the endpoint decides whether it is acceptable.
pub fn normalize_request(mut req: StreamRequest) -> CoreResult<StreamRequest> {
    let id = req.assistant_id.trim();
    if id.is_empty() {
        return Err(ChatStreamError::Validation("assistant id must not be empty".into()));
    }
    if id == "." || id == ".." || !ASSISTANT_ID.is_match(id) {
        return Err(ChatStreamError::Validation(format!(
            "assistant id '{id}' contains characters not allowed in a URL path segment"
        )));
    }
    req.assistant_id = id.to_string();
    req.request_id = req
        .request_id
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Ok(req)
}
