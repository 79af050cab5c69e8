use async_trait::async_trait;
use futures_util::StreamExt;
use http::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::HttpCfg;
use crate::error::{ChatStreamError, CoreResult};
use crate::model::ChatPayload;
use crate::transport::{EventTransport, OpenedStream};

pub const EVENT_STREAM: &str = "text/event-stream";

/// Request context carries the caller's correlation id.
#[derive(Clone, Copy, Default, Debug)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
}

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(std::time::Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(std::time::Duration::from_millis(ms));
        }
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| ChatStreamError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: "ragchat/0.1".to_string(),
        })
    }

    /// POST JSON declaring `Accept: text/event-stream` and hand back the body as a
    /// byte stream once the status is known to be successful.
    pub async fn post_event_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<OpenedStream> {
        let mut req = self
            .inner
            .post(url)
            .json(body)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, EVENT_STREAM);

        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ChatStreamError::Unavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let endpoint_request_id = extract_request_id(resp.headers());
        if !status.is_success() {
            // The error body is never read; it may be large or never finish.
            let ra = parse_retry_after(resp.headers());
            return Err(map_http_error(status, ra));
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatStreamError::Read(e.to_string())));
        Ok(OpenedStream {
            status: status.as_u16(),
            endpoint_request_id,
            body: Box::pin(body),
        })
    }
}

#[async_trait]
impl EventTransport for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_stream(
        &self,
        url: &str,
        payload: &ChatPayload,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<OpenedStream> {
        self.post_event_stream(url, payload, headers, ctx).await
    }
}

fn extract_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    static CANDIDATES: [&str; 3] = ["x-request-id", "request-id", "x-correlation-id"];
    for k in CANDIDATES {
        if let Some(v) = headers.get(k)
            && let Ok(s) = v.to_str()
        {
            return Some(s.to_string());
        }
    }
    None
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Some(secs);
    }
    // HTTP-date forms are ignored.
    None
}

fn map_http_error(status: StatusCode, retry_after: Option<u64>) -> ChatStreamError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ChatStreamError::RateLimited { retry_after },
        s if s.is_server_error() => ChatStreamError::Unavailable {
            reason: format!("HTTP {}", s.as_u16()),
        },
        s => ChatStreamError::Http {
            status: s.as_u16(),
            reason: s.canonical_reason().unwrap_or("unexpected status").to_string(),
        },
    }
}
