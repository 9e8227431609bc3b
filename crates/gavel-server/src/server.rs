use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use gavel_telemetry::ServiceMetrics;

use crate::dispatch::EventDispatcher;
use crate::liveness;
use crate::registry::ConnectionRegistry;
use crate::session;
use crate::topics::TopicTable;
use crate::triggers;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    pub sweep_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            max_send_queue: 256,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub topics: Arc<TopicTable>,
    pub dispatcher: Arc<EventDispatcher>,
    pub metrics: Arc<ServiceMetrics>,
    pub max_send_queue: usize,
}

impl AppState {
    pub fn new(max_send_queue: usize) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let topics = Arc::new(TopicTable::new());
        let metrics = Arc::new(ServiceMetrics::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&topics),
            Arc::clone(&metrics),
        ));
        Self {
            registry,
            topics,
            dispatcher,
            metrics,
            max_send_queue,
        }
    }
}

/// Build the Axum router with the WebSocket endpoint, the trigger surface
/// for the auction backend, and the observability routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(triggers::stats))
        .route("/trigger/notify", post(triggers::notify))
        .route("/trigger/bid_update", post(triggers::bid_update))
        .route("/trigger/timer_update", post(triggers::timer_update))
        .route("/trigger/auction_update", post(triggers::auction_update))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Binding port 0 picks a free port; the
/// handle reports the one actually bound.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(config.max_send_queue);

    let sweep_task = liveness::start_liveness_sweep(
        Arc::clone(&state.registry),
        Arc::clone(&state.topics),
        Arc::clone(&state.metrics),
        config.sweep_interval,
    );

    let router = build_router(state.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Auction event service listening");

    let server_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Server task exited");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        state,
        server_task,
        sweep_task,
    })
}

/// Keeps the background tasks alive and tears them down on shutdown.
pub struct ServerHandle {
    pub port: u16,
    pub state: AppState,
    server_task: tokio::task::JoinHandle<()>,
    sweep_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and close the live ones. 1001 is the
    /// standard going-away code.
    pub fn shutdown(&self) {
        for (_, conn) in self.state.registry.snapshot() {
            conn.close(1001, "server shutting down");
        }
        self.server_task.abort();
        self.sweep_task.abort();
        tracing::info!("Auction event service stopped");
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run_ws_session(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}
