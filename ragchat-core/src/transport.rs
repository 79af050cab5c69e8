use async_trait::async_trait;

use crate::error::CoreResult;
use crate::http_client::RequestCtx;
use crate::model::ChatPayload;

/// Boxed stream of raw body chunks. Transport failures mid-body arrive as `Err` items.
pub type ByteStream = std::pin::Pin<
    Box<dyn futures_util::stream::Stream<Item = CoreResult<bytes::Bytes>> + Send>,
>;

/// A response whose status was already checked, with its body not yet consumed.
pub struct OpenedStream {
    pub status: u16,
    /// Correlation id reported by the endpoint, if any.
    pub endpoint_request_id: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("status", &self.status)
            .field("endpoint_request_id", &self.endpoint_request_id)
            .finish_non_exhaustive()
    }
}

/// Opens a streamed POST. Implementations must return `Err` for non-2xx statuses
/// without handing out the body.
#[async_trait]
pub trait EventTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn open_stream(
        &self,
        url: &str,
        payload: &ChatPayload,
        headers: &[(&str, &str)],
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<OpenedStream>;
}
