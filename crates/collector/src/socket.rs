//! Per-connection WebSocket handling

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// A message received from one client, to be delivered to all others
#[derive(Debug, Clone)]
pub struct Broadcast {
    /// Connection that sent the message
    pub sender: u64,
    /// Frame to forward
    pub message: Message,
}

/// Upgrade handler
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before registering so a client counted as connected
    // never misses a broadcast
    let mut rx = state.sender().subscribe();
    let (id, clients) = state.register();
    info!(client = id, clients, "Client connected");

    let (mut outgoing, mut incoming) = socket.split();

    let mut forward = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(broadcast) if broadcast.sender != id => {
                    if outgoing.send(broadcast.message).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(client = id, "Client lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let tx = state.sender().clone();
    let mut receive = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                Message::Text(ref text) => {
                    info!(client = id, "Received: {}", text);
                }
                Message::Binary(ref bytes) => {
                    info!(client = id, "Received {} bytes", bytes.len());
                }
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => continue,
            }
            // No receivers just means nobody else is listening
            if tx.send(Broadcast { sender: id, message }).is_err() {
                debug!(client = id, "No other clients to broadcast to");
            }
        }
    });

    tokio::select! {
        _ = &mut forward => receive.abort(),
        _ = &mut receive => forward.abort(),
    }

    let clients = state.unregister();
    info!(client = id, clients, "Client disconnected");
}
