pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod reader;
pub mod stream;
pub mod telemetry;
pub mod transport;
#[cfg(test)]
pub mod test_util;

pub use config::Config;
pub use error::{ChatStreamError, CoreResult};
pub use frame::{MalformedFrame, MalformedReason};
pub use model::{ChatResult, StreamRequest};
pub use reader::{ChatCallbacks, ChatHandle, StreamCallbacks, StreamingChatClient};
pub use stream::{BoxStreamEv, StreamEvent};
