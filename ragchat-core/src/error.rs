use thiserror::Error;

/// Core error type for ragchat.
///
/// Every terminal failure of a chat turn is normalized into one of these before it
/// reaches the caller. Frame-level parse problems never become a `ChatStreamError`.
#[derive(Debug, Error)]
pub enum ChatStreamError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("chat endpoint returned HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("rate limited by chat endpoint (HTTP 429)")]
    RateLimited { retry_after: Option<u64> },

    #[error("chat endpoint unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("stream read failed: {0}")]
    Read(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatStreamError {
    /// Short, stable label used in logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Http { .. } => "http_status",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::Read(_) => "read",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, ChatStreamError>;
