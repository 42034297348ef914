//! Telemetry Collector
//!
//! WebSocket server the relay sends readings to. Every message a client
//! sends is re-broadcast to all other connected clients (dashboards).

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod settings;
mod socket;

pub use settings::CollectorConfig;
pub use socket::Broadcast;

/// Collector errors
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Application state shared across connections
pub struct AppState {
    /// Fan-out channel carrying every received message
    tx: broadcast::Sender<Broadcast>,
    /// Id handed to the next connection
    next_client_id: AtomicU64,
    /// Currently connected clients
    clients: AtomicUsize,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(config: &CollectorConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            tx,
            next_client_id: AtomicU64::new(1),
            clients: AtomicUsize::new(0),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    pub(crate) fn sender(&self) -> &broadcast::Sender<Broadcast> {
        &self.tx
    }

    /// Register a connection, returning its id and the new client count
    pub(crate) fn register(&self) -> (u64, usize) {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let clients = self.clients.fetch_add(1, Ordering::SeqCst) + 1;
        (id, clients)
    }

    /// Forget a connection, returning the remaining client count
    pub(crate) fn unregister(&self) -> usize {
        self.clients.fetch_sub(1, Ordering::SeqCst) - 1
    }

    /// Health summary
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok".to_string(),
            version: self.version.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            clients: self.client_count(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub clients: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(socket::ws_handler))
        .route("/ws", get(socket::ws_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

/// Initialize logging
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), CollectorError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run the server
pub async fn run_server(config: CollectorConfig) -> Result<(), CollectorError> {
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| CollectorError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
    let state = Arc::new(AppState::new(&config));

    info!("Broadcast WebSocket server running on {}", config.bind_addr);

    serve(listener, state, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down collector");
        }
    })
    .await
}
