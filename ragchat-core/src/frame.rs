//! Parsing of single event-stream lines into frames.
//!
//! Only lines starting with `data: ` carry payloads. Two JSON shapes share the stream:
//! `{"token": "..."}` for incremental text and
//! `{"contexts": [...], "source_urls": [...]}` for the final metadata packet.

use serde_json::Value;

pub const DATA_PREFIX: &str = "data: ";

/// A recognized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Token(String),
    Metadata {
        contexts: Vec<String>,
        source_urls: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The payload after `data: ` is not JSON of the expected shape.
    InvalidJson(String),
    /// Valid JSON, but neither a `token` nor a `contexts` field.
    UnrecognizedShape,
    /// The line exceeded the decode buffer cap and was dropped unread.
    Oversized { bytes: usize },
}

/// A `data:` line that was skipped. Never an error; only reported to diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedFrame {
    pub line: String,
    pub reason: MalformedReason,
}

impl MalformedFrame {
    pub(crate) fn oversized(bytes: usize) -> Self {
        Self {
            line: String::new(),
            reason: MalformedReason::Oversized { bytes },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Frame(Frame),
    Malformed(MalformedFrame),
    /// Blank keep-alives, comments, `event:`/`id:` fields and anything else.
    Ignored,
}

/// Parse one line. The `token` field is read on its own, so an odd-typed sibling
/// field never costs a token.
pub fn parse_line(line: &str) -> ParsedLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return ParsedLine::Ignored;
    };
    let malformed = |reason: MalformedReason| {
        ParsedLine::Malformed(MalformedFrame {
            line: line.to_string(),
            reason,
        })
    };

    let obj = match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(obj)) => obj,
        Ok(_) => return malformed(MalformedReason::InvalidJson("expected a JSON object".into())),
        Err(e) => return malformed(MalformedReason::InvalidJson(e.to_string())),
    };

    if let Some(token) = obj.get("token") {
        return match token.as_str() {
            Some(t) => ParsedLine::Frame(Frame::Token(t.to_string())),
            None => malformed(MalformedReason::InvalidJson("token is not a string".into())),
        };
    }

    if let Some(contexts) = obj.get("contexts") {
        let Some(contexts) = string_list(contexts) else {
            return malformed(MalformedReason::InvalidJson(
                "contexts is not a list of strings".into(),
            ));
        };
        // absent or unusable source_urls means no sources
        let source_urls = obj
            .get("source_urls")
            .and_then(string_list)
            .unwrap_or_default();
        return ParsedLine::Frame(Frame::Metadata {
            contexts,
            source_urls,
        });
    }

    malformed(MalformedReason::UnrecognizedShape)
}

fn string_list(v: &Value) -> Option<Vec<String>> {
    v.as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
