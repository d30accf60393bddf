//! Terminal client for a Tegaki room.
//!
//! Resolves the room slug (through the REST API when `--api-url` is given),
//! connects to the relay with the access token, and mirrors the room's canvas.
//! Drawing, selection, panning and chat are driven by slash commands.
//! Lost connections are retried with exponential backoff.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tegaki-client -- --room demo --token "$TOKEN"
//! cargo run --bin tegaki-client -- -r demo -t "$TOKEN" --api-url http://127.0.0.1:3000/api
//! ```

use std::sync::Arc;

use clap::Parser;

use tegaki_client::{
    config::ClientConfig,
    room_lookup::{HttpRoomDirectory, RoomDirectory, SlugRoomDirectory},
};
use tegaki_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ClientConfig::parse();

    let directory: Arc<dyn RoomDirectory> = match &config.api_url {
        Some(api_url) => Arc::new(HttpRoomDirectory::new(api_url.clone(), config.token.clone())),
        None => Arc::new(SlugRoomDirectory),
    };

    if let Err(e) = tegaki_client::run_client(config, directory).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
