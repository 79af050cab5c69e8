//! The streaming response reader: one chat turn from POST to terminal event.
//!
//! A turn is a small state machine (`requesting → streaming → completed | failed`)
//! driven one step at a time. Both the pull-based [`StreamingChatClient::stream_chat`]
//! and the callback-based [`StreamingChatClient::run`] drive the same machine, so
//! ordering and the single-terminal guarantee hold for both.
//!
//! Only one body read is outstanding at a time and every line of a chunk is handled
//! before the next read, so events come out in arrival order and never overlap.
//! Dropping the stream (or aborting a [`ChatHandle`]) stops processing; nothing is
//! delivered after that, not even a "cancelled" signal.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::Instrument;
use tracing::field::Empty;

use crate::config::{ASSISTANT_ID_PLACEHOLDER, Config, StreamCfg};
use crate::decode::{DecodeBuffer, DecodedLine};
use crate::error::{ChatStreamError, CoreResult};
use crate::frame::{Frame, MalformedFrame, ParsedLine, parse_line};
use crate::http_client::{HttpClient, RequestCtx};
use crate::model::{ChatPayload, ChatResult, StreamRequest};
use crate::normalizer::normalize_request;
use crate::stream::{BoxStreamEv, StreamEvent};
use crate::telemetry::{self, CompletionLog, StreamTrace};
use crate::telemetry::{
    KEY_ENDPOINT_REQUEST_ID, KEY_FRAMES_SKIPPED, KEY_LATENCY_MS, KEY_OUTCOME, KEY_TOKENS,
};
use crate::transport::{ByteStream, EventTransport};

/// Caller continuation for one turn.
///
/// `on_token` fires 0..n times, then exactly one of `on_complete` / `on_error`.
/// Nothing fires after the terminal call.
pub trait StreamCallbacks: Send {
    fn on_token(&mut self, token: &str);
    fn on_complete(&mut self, result: ChatResult);
    fn on_error(&mut self, error: ChatStreamError);

    /// Diagnostic hook for skipped `data:` lines. Never terminal.
    fn on_malformed_frame(&mut self, _frame: &MalformedFrame) {}
}

/// [`StreamCallbacks`] built from three closures.
pub struct ChatCallbacks<T, C, E> {
    on_token: T,
    on_complete: C,
    on_error: E,
}

impl<T, C, E> ChatCallbacks<T, C, E>
where
    T: FnMut(&str) + Send,
    C: FnMut(ChatResult) + Send,
    E: FnMut(ChatStreamError) + Send,
{
    pub fn new(on_token: T, on_complete: C, on_error: E) -> Self {
        Self {
            on_token,
            on_complete,
            on_error,
        }
    }
}

impl<T, C, E> StreamCallbacks for ChatCallbacks<T, C, E>
where
    T: FnMut(&str) + Send,
    C: FnMut(ChatResult) + Send,
    E: FnMut(ChatStreamError) + Send,
{
    fn on_token(&mut self, token: &str) {
        (self.on_token)(token)
    }

    fn on_complete(&mut self, result: ChatResult) {
        (self.on_complete)(result)
    }

    fn on_error(&mut self, error: ChatStreamError) {
        (self.on_error)(error)
    }
}

/// Handle to a turn started with [`StreamingChatClient::start_streaming_chat`].
/// Dropping it does not cancel the turn.
#[derive(Debug)]
pub struct ChatHandle {
    task: tokio::task::JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl ChatHandle {
    /// Stop the turn. Once this returns no further callback is dispatched, even
    /// if the task is mid-callback on another worker.
    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the turn. Returns `false` if it was aborted before finishing.
    pub async fn join(self) -> bool {
        self.task.await.is_ok()
    }
}

/// Client for the platform's streaming chat endpoint. Cheap to clone.
#[derive(Clone)]
pub struct StreamingChatClient {
    transport: Arc<dyn EventTransport>,
    base_url: String,
    stream_path: String,
    api_key: Option<Arc<SecretString>>,
    stream_cfg: StreamCfg,
}

impl std::fmt::Debug for StreamingChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingChatClient")
            .field("transport", &self.transport.name())
            .field("base_url", &self.base_url)
            .field("stream_path", &self.stream_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("stream_cfg", &self.stream_cfg)
            .finish()
    }
}

impl StreamingChatClient {
    pub fn new(transport: Arc<dyn EventTransport>, base_url: impl Into<String>) -> Self {
        let defaults = Config::with_base_url(base_url);
        Self {
            transport,
            base_url: defaults.api.base_url,
            stream_path: defaults.api.stream_path,
            api_key: None,
            stream_cfg: defaults.stream,
        }
    }

    /// Build an HTTP-backed client. The bearer token, if configured, is read from
    /// the named environment variable now rather than per request.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        cfg.validate()?;
        let http = HttpClient::from_cfg(&cfg.http)?;
        let mut client = Self::new(Arc::new(http), cfg.api.base_url.clone())
            .with_stream_path(cfg.api.stream_path.clone())
            .with_stream_cfg(cfg.stream.clone());
        if let Some(var) = &cfg.api.api_key_env {
            let key = std::env::var(var).map_err(|_| {
                ChatStreamError::Validation(format!("environment variable {var} is not set"))
            })?;
            client = client.with_api_key(SecretString::new(key.into_boxed_str()));
        }
        Ok(client)
    }

    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    pub fn with_stream_cfg(mut self, cfg: StreamCfg) -> Self {
        self.stream_cfg = cfg;
        self
    }

    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(Arc::new(key));
        self
    }

    /// URL of the streaming endpoint for one assistant.
    pub fn endpoint_url(&self, assistant_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.stream_path.replace(ASSISTANT_ID_PLACEHOLDER, assistant_id)
        )
    }

    /// Stream one turn as events: 0..n `Token`, then one `Complete` or `Error`, then end.
    pub fn stream_chat(&self, req: StreamRequest) -> BoxStreamEv {
        futures::stream::unfold(self.turn(req), |mut turn| async move {
            turn.next().await.map(|ev| (ev, turn))
        })
        .filter_map(|ev| {
            futures::future::ready(match ev {
                TurnEvent::Emit(ev) => Some(ev),
                TurnEvent::Malformed(_) => None,
            })
        })
        .fuse()
        .boxed()
    }

    /// Drive one turn to its terminal callback.
    pub async fn run<C: StreamCallbacks + ?Sized>(&self, req: StreamRequest, callbacks: &mut C) {
        self.run_until(req, callbacks, &AtomicBool::new(false)).await
    }

    async fn run_until<C: StreamCallbacks + ?Sized>(
        &self,
        req: StreamRequest,
        callbacks: &mut C,
        cancelled: &AtomicBool,
    ) {
        let mut turn = self.turn(req);
        while let Some(ev) = turn.next().await {
            if cancelled.load(Ordering::Acquire) {
                tracing::debug!("chat turn cancelled");
                return;
            }
            match ev {
                TurnEvent::Emit(StreamEvent::Token(token)) => callbacks.on_token(&token),
                TurnEvent::Emit(StreamEvent::Complete(result)) => callbacks.on_complete(result),
                TurnEvent::Emit(StreamEvent::Error(err)) => callbacks.on_error(err),
                TurnEvent::Malformed(frame) => callbacks.on_malformed_frame(&frame),
            }
        }
    }

    /// Fire-and-forget: spawn the turn on the current tokio runtime.
    pub fn start_streaming_chat<C>(
        &self,
        assistant_id: impl Into<String>,
        message: impl Into<String>,
        callbacks: C,
    ) -> ChatHandle
    where
        C: StreamCallbacks + 'static,
    {
        self.start(StreamRequest::new(assistant_id, message), callbacks)
    }

    /// Like [`Self::start_streaming_chat`] for a fully specified request.
    pub fn start<C>(&self, req: StreamRequest, mut callbacks: C) -> ChatHandle
    where
        C: StreamCallbacks + 'static,
    {
        let client = self.clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let task = tokio::spawn(async move {
            client.run_until(req, &mut callbacks, &flag).await
        });
        ChatHandle { task, cancelled }
    }

    fn turn(&self, request: StreamRequest) -> ChatTurn {
        let raw_id = request.assistant_id.clone();
        let raw_request_id = request.request_id.clone();
        let (phase, assistant_id, request_id) = match normalize_request(request) {
            Ok(req) => {
                let open = PendingOpen {
                    url: self.endpoint_url(&req.assistant_id),
                    payload: ChatPayload::question(req.message),
                    request_id: req.request_id.clone(),
                    authorization: self
                        .api_key
                        .as_ref()
                        .map(|k| format!("Bearer {}", k.expose_secret())),
                };
                (Phase::Pending(open), req.assistant_id, req.request_id)
            }
            Err(err) => (Phase::Rejected(err), raw_id, raw_request_id),
        };

        let span = tracing::info_span!(
            "chat_stream",
            assistant.id = %assistant_id,
            req.id = request_id.as_deref(),
            endpoint.req_id = Empty,
            stream.outcome = Empty,
            stream.tokens = Empty,
            stream.frames_skipped = Empty,
            latency.ms = Empty,
        );

        ChatTurn {
            transport: self.transport.clone(),
            phase,
            lines: VecDeque::new(),
            result: ChatResult::default(),
            assistant_id,
            request_id,
            endpoint_request_id: None,
            tokens: 0,
            skipped: 0,
            max_line_bytes: self.stream_cfg.max_line_bytes,
            idle_timeout: self.stream_cfg.idle_timeout_ms.map(Duration::from_millis),
            started: Instant::now(),
            span,
        }
    }
}

struct PendingOpen {
    url: String,
    payload: ChatPayload,
    request_id: Option<String>,
    authorization: Option<String>,
}

enum Phase {
    Rejected(ChatStreamError),
    Pending(PendingOpen),
    Streaming { body: ByteStream, buffer: DecodeBuffer },
    /// Body ended; queued lines are still being handed out.
    Draining,
    Done,
}

enum TurnEvent {
    Emit(StreamEvent),
    Malformed(MalformedFrame),
}

struct ChatTurn {
    transport: Arc<dyn EventTransport>,
    phase: Phase,
    lines: VecDeque<DecodedLine>,
    result: ChatResult,
    assistant_id: String,
    request_id: Option<String>,
    endpoint_request_id: Option<String>,
    tokens: u64,
    skipped: u64,
    max_line_bytes: usize,
    idle_timeout: Option<Duration>,
    started: Instant,
    span: tracing::Span,
}

impl ChatTurn {
    async fn next(&mut self) -> Option<TurnEvent> {
        let span = self.span.clone();
        self.step().instrument(span).await
    }

    async fn step(&mut self) -> Option<TurnEvent> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                match line {
                    DecodedLine::Line(text) => match parse_line(&text) {
                        ParsedLine::Frame(Frame::Token(token)) => {
                            self.result.response_text.push_str(&token);
                            self.tokens += 1;
                            return Some(TurnEvent::Emit(StreamEvent::Token(token)));
                        }
                        ParsedLine::Frame(Frame::Metadata {
                            contexts,
                            source_urls,
                        }) => {
                            // sent once as a final packet; replace, never merge
                            self.result.contexts = contexts;
                            self.result.source_urls = source_urls;
                        }
                        ParsedLine::Malformed(frame) => return Some(self.skip(frame)),
                        ParsedLine::Ignored => {}
                    },
                    DecodedLine::Oversized(bytes) => {
                        return Some(self.skip(MalformedFrame::oversized(bytes)));
                    }
                }
                continue;
            }

            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Rejected(err) => return Some(self.fail(err)),
                Phase::Pending(open) => match self.open(open).await {
                    Ok(body) => {
                        self.phase = Phase::Streaming {
                            body,
                            buffer: DecodeBuffer::new(self.max_line_bytes),
                        };
                    }
                    Err(err) => return Some(self.fail(err)),
                },
                Phase::Streaming { mut body, mut buffer } => {
                    match read_chunk(&mut body, self.idle_timeout).await {
                        Ok(Some(chunk)) => {
                            self.lines.extend(buffer.feed(&chunk));
                            self.phase = Phase::Streaming { body, buffer };
                        }
                        Ok(None) => {
                            self.lines.extend(buffer.finish());
                            self.phase = Phase::Draining;
                        }
                        Err(err) => return Some(self.fail(err)),
                    }
                }
                Phase::Draining => return Some(self.complete()),
                Phase::Done => return None,
            }
        }
    }

    async fn open(&mut self, open: PendingOpen) -> CoreResult<ByteStream> {
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(auth) = &open.authorization {
            headers.push(("Authorization", auth.as_str()));
        }
        let ctx = RequestCtx {
            request_id: open.request_id.as_deref(),
        };

        let opened = self
            .transport
            .open_stream(&open.url, &open.payload, &headers, &ctx)
            .await?;

        if let Some(erid) = &opened.endpoint_request_id {
            self.span.record(KEY_ENDPOINT_REQUEST_ID, erid.as_str());
        }
        self.endpoint_request_id = opened.endpoint_request_id.clone();
        tracing::debug!(status = opened.status, url = %open.url, "event stream opened");
        telemetry::emit(
            StreamTrace::new()
                .assistant_id(&self.assistant_id)
                .request_id_opt(self.request_id.as_deref())
                .endpoint_request_id_opt(self.endpoint_request_id.as_deref())
                .transport(self.transport.name())
                .status(opened.status)
                .time_to_headers_ms(self.elapsed_ms()),
        );
        Ok(opened.body)
    }

    fn skip(&mut self, frame: MalformedFrame) -> TurnEvent {
        self.skipped += 1;
        tracing::debug!(reason = ?frame.reason, line = %frame.line, "skipping malformed frame");
        TurnEvent::Malformed(frame)
    }

    fn fail(&mut self, err: ChatStreamError) -> TurnEvent {
        self.phase = Phase::Done;
        self.lines.clear();
        let latency = self.elapsed_ms();
        self.record_outcome("error", latency);
        tracing::warn!(error = %err, kind = err.kind(), tokens = self.tokens, "chat stream failed");
        telemetry::emit_completion(
            self.log("error", latency)
                .error(err.kind(), &err.to_string()),
        );
        TurnEvent::Emit(StreamEvent::Error(err))
    }

    fn complete(&mut self) -> TurnEvent {
        self.phase = Phase::Done;
        let result = std::mem::take(&mut self.result);
        let latency = self.elapsed_ms();
        self.record_outcome("complete", latency);
        tracing::info!(
            tokens = self.tokens,
            contexts = result.contexts.len(),
            sources = result.source_urls.len(),
            "chat stream complete"
        );
        telemetry::emit_completion(self.log("complete", latency).result_shape(
            result.response_text.chars().count() as u64,
            result.contexts.len() as u32,
            result.source_urls.len() as u32,
        ));
        TurnEvent::Emit(StreamEvent::Complete(result))
    }

    fn record_outcome(&self, outcome: &str, latency_ms: u64) {
        self.span.record(KEY_OUTCOME, outcome);
        self.span.record(KEY_TOKENS, self.tokens);
        self.span.record(KEY_FRAMES_SKIPPED, self.skipped);
        self.span.record(KEY_LATENCY_MS, latency_ms);
    }

    fn log(&self, outcome: &str, latency_ms: u64) -> CompletionLog {
        CompletionLog::new()
            .assistant_id(&self.assistant_id)
            .request_id_opt(self.request_id.as_deref())
            .endpoint_request_id_opt(self.endpoint_request_id.as_deref())
            .latency_ms(latency_ms)
            .outcome(outcome)
            .counts(self.tokens, self.skipped)
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

// Must not borrow `&ChatTurn` across the await: the turn is `Send` but not `Sync`.
async fn read_chunk(
    body: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> CoreResult<Option<Bytes>> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, body.next())
            .await
            .map_err(|_| {
                ChatStreamError::Read(format!(
                    "no data received for {} ms",
                    limit.as_millis()
                ))
            })?,
        None => body.next().await,
    };
    next.transpose()
}
