//! Outbound telemetry link
//!
//! The relay only ever writes to the collector; incoming frames are never
//! read.

use crate::error::RelayError;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

/// Destination for serialized readings
#[allow(async_fn_in_trait)]
pub trait TelemetrySink {
    /// Send one message. No retry is attempted on failure.
    async fn send(&mut self, message: String) -> Result<(), RelayError>;

    /// Release the link, best effort
    async fn close(&mut self);
}

/// WebSocket connection to the collector
pub struct WebSocketSink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    uri: String,
}

impl WebSocketSink {
    /// Open the WebSocket connection
    pub async fn connect(uri: &str) -> Result<Self, RelayError> {
        let (stream, response) = tokio_tungstenite::connect_async(uri)
            .await
            .map_err(|e| RelayError::Connect(format!("{uri}: {e}")))?;

        info!(status = %response.status(), "Connected to WebSocket server {}", uri);

        Ok(Self {
            stream,
            uri: uri.to_string(),
        })
    }

    /// URI this sink is connected to
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl TelemetrySink for WebSocketSink {
    async fn send(&mut self, message: String) -> Result<(), RelayError> {
        self.stream
            .send(Message::Text(message))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        match self.stream.close(None).await {
            Ok(()) => info!("Closed WebSocket connection to {}", self.uri),
            Err(e) => debug!("WebSocket close failed: {}", e),
        }
    }
}
