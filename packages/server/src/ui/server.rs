//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{
    handler::{
        debug_room_snapshot, get_chat_history, get_room_detail, get_rooms, health_check,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Tegaki relay server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router with every endpoint
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{room_id}", get(get_room_detail))
            .route("/api/rooms/{room_id}/chats", get(get_chat_history))
            .route("/debug/rooms/{room_id}", get(debug_room_snapshot))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the relay
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Tegaki relay listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already bound listener until a termination signal arrives
    /// or the shutdown coordinator is triggered.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let app = self.router();
        let shutdown = self.state.shutdown.clone();
        let mut triggered = shutdown.listener();

        let signal = {
            let shutdown = shutdown.clone();
            async move {
                tokio::select! {
                    _ = shutdown_signal() => shutdown.trigger(),
                    _ = triggered.triggered() => {}
                }
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        // Upgraded sockets outlive axum's own graceful shutdown
        let open = shutdown.active_connections();
        if open > 0 {
            tracing::info!("Draining {} open connections", open);
        }
        if !shutdown.wait_for_drain().await {
            tracing::warn!(
                "Drain timed out with {} connections still open",
                shutdown.active_connections()
            );
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}
