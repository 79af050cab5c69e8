//! Streaming primitives exposed by ragchat.
//!
//! Contract:
//! - A turn emits 0..n `Token` events followed by exactly one terminal event:
//!   `Complete` or `Error`.
//! - After the terminal event the stream ends.
//! - Tokens delivered before an `Error` remain valid; they are never retracted.
//!
//! `Error` carries `ChatStreamError`, which is not `Clone`, so neither is this enum.

use crate::error::ChatStreamError;
use crate::model::ChatResult;

/// What the caller receives incrementally.
#[non_exhaustive]
#[derive(Debug)]
pub enum StreamEvent {
    /// One text fragment, exactly as sent. Empty string is allowed but should be rare.
    Token(String),
    /// Clean end of stream with the accumulated result.
    Complete(ChatResult),
    /// Transport/read failure; stream ends after this.
    Error(ChatStreamError),
}

impl StreamEvent {
    /// Returns true if this event terminates the stream (`Complete` or `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }

    /// Convenience accessor for `Token` contents.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Boxed stream of chat events, as returned by `StreamingChatClient::stream_chat`.
pub type BoxStreamEv = futures::stream::BoxStream<'static, StreamEvent>;
