use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

use crate::error::Result;

/// A message-level websocket, independent of the underlying stream
pub trait Socket:
    Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin
{
}

impl<T> Socket for T where
    T: Stream<Item = std::result::Result<Message, WsError>>
        + Sink<Message, Error = WsError>
        + Send
        + Unpin
{
}

pub type BoxSocket = Box<dyn Socket>;

/// Opens gateway sockets. Swapped out in tests for in-memory servers.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<BoxSocket>;
}

/// TLS websocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<BoxSocket> {
        let (stream, response) = connect_async(url).await?;
        debug!(url, status = %response.status(), "websocket connected");
        Ok(Box::new(stream))
    }
}
