//! Transport seam: opening a receive-only session to the bridge.

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::error::TelemetryError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a live session yields. End of stream means the transport closed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    /// Raw payload; decoding decides whether it is a reading.
    Binary(Vec<u8>),
    Error(String),
}

pub type TransportStream = BoxStream<'static, TransportEvent>;

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<TransportStream, TelemetryError>;
}

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportStream, TelemetryError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TelemetryError::Open(e.to_string()))?;
        debug!(url, "websocket open");
        Ok(events(ws).boxed())
    }
}

// Data frames pass through untouched. The stream ends after a close frame or
// the first error.
fn events(ws: WsStream) -> impl futures_util::Stream<Item = TransportEvent> + Send {
    stream::unfold(Some(ws), |state| async move {
        let mut ws = state?;
        loop {
            match ws.next().await {
                None | Some(Ok(Message::Close(_))) => return None,
                Some(Ok(Message::Text(text))) => return Some((TransportEvent::Text(text), Some(ws))),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some((TransportEvent::Binary(bytes), Some(ws)))
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some((TransportEvent::Error(e.to_string()), None)),
            }
        }
    })
}
