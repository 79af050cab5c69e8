//! Test doubles: a transport that replays scripted chunks and callbacks that record calls.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::{ChatStreamError, CoreResult};
use crate::frame::{MalformedFrame, MalformedReason};
use crate::http_client::RequestCtx;
use crate::model::{ChatPayload, ChatResult};
use crate::reader::StreamCallbacks;
use crate::transport::{EventTransport, OpenedStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub question: String,
    pub headers: Vec<(String, String)>,
    pub request_id: Option<String>,
}

/// Replays one scripted response. A second `open_stream` fails.
pub struct ScriptedTransport {
    outcome: Mutex<Option<CoreResult<Vec<CoreResult<Bytes>>>>>,
    stall: bool,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    fn build(outcome: CoreResult<Vec<CoreResult<Bytes>>>, stall: bool) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(Some(outcome)),
            stall,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Body delivered as exactly these chunks, then end of stream.
    pub fn chunks<I, B>(chunks: I) -> Arc<Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::build(Ok(chunks.into_iter().map(|c| Ok(c.into())).collect()), false)
    }

    /// Body items may include mid-stream errors.
    pub fn items(items: Vec<CoreResult<Bytes>>) -> Arc<Self> {
        Self::build(Ok(items), false)
    }

    /// These chunks, then the body never produces anything again.
    pub fn stalled<I, B>(chunks: I) -> Arc<Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::build(Ok(chunks.into_iter().map(|c| Ok(c.into())).collect()), true)
    }

    /// The open itself fails (bad status, connection refused, ...).
    pub fn failing(err: ChatStreamError) -> Arc<Self> {
        Self::build(Err(err), false)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(
        &self,
        url: &str,
        payload: &ChatPayload,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<OpenedStream> {
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            question: payload.input_data.question.clone(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            request_id: ctx.request_id.map(str::to_string),
        });

        let items = self
            .outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(anyhow::anyhow!("script already consumed").into()))?;

        let body = futures::stream::iter(items);
        let body = if self.stall {
            body.chain(futures::stream::pending()).boxed()
        } else {
            body.boxed()
        };
        Ok(OpenedStream {
            status: 200,
            endpoint_request_id: Some("scripted-1".into()),
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Token(String),
    Complete(ChatResult),
    Error(String),
    Malformed(MalformedReason),
}

/// Callbacks that append every invocation to a shared log.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Token(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn terminals(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Complete(_) | Call::Error(_)))
            .collect()
    }
}

impl StreamCallbacks for Recorder {
    fn on_token(&mut self, token: &str) {
        self.calls.lock().unwrap().push(Call::Token(token.to_string()));
    }

    fn on_complete(&mut self, result: ChatResult) {
        self.calls.lock().unwrap().push(Call::Complete(result));
    }

    fn on_error(&mut self, error: ChatStreamError) {
        self.calls.lock().unwrap().push(Call::Error(error.to_string()));
    }

    fn on_malformed_frame(&mut self, frame: &MalformedFrame) {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Malformed(frame.reason.clone()));
    }
}
