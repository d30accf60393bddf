//! Tegaki relay.
//!
//! Authenticates WebSocket clients, keeps per-room canvas snapshots in memory
//! and relays drawing, cursor and chat messages to the other room members.
//!
//! Run with:
//! ```not_rust
//! TEGAKI_JWT_SECRET=dev-secret cargo run --bin tegaki-server
//! cargo run --bin tegaki-server -- --host 0.0.0.0 --port 3000 --jwt-secret dev-secret
//! ```

use std::sync::Arc;

use clap::Parser;
use tegaki_server::{
    config::ServerConfig,
    domain::ChatStore,
    infrastructure::{
        auth::JwtCredentialVerifier,
        chat_store::{FileChatStore, InMemoryChatStore},
        message_pusher::WebSocketMessagePusher,
        repository::InMemoryRoomRepository,
    },
    ui::{AppState, Server, ShutdownCoordinator},
    usecase::{
        ConnectParticipantUseCase, DisconnectParticipantUseCase, GetChatHistoryUseCase,
        GetRoomDetailUseCase, GetRoomsUseCase, JoinRoomUseCase, LeaveRoomUseCase, RoomLocks,
        RouteMessageUseCase, SendMessageUseCase,
    },
};
use tegaki_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let config = ServerConfig::parse();

    // Initialize dependencies in order:
    // 1. Repository
    // 2. MessagePusher
    // 3. Collaborators (credential verifier, chat store)
    // 4. UseCases
    // 5. AppState
    // 6. Server

    // 1. Create Repository (in-memory room registry)
    let repository = Arc::new(InMemoryRoomRepository::new());

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::new(config.max_consecutive_drops));

    // 3. Create collaborators
    let verifier = Arc::new(JwtCredentialVerifier::new(&config.jwt_secret));
    let chat_store: Arc<dyn ChatStore> = match &config.chat_log {
        Some(path) => {
            tracing::info!("Appending chat messages to {}", path.display());
            Arc::new(FileChatStore::new(path))
        }
        None => {
            tracing::info!("Keeping chat history in memory");
            Arc::new(InMemoryChatStore::default())
        }
    };
    let clock = Arc::new(SystemClock);
    let room_locks = Arc::new(RoomLocks::new());

    // 4. Create UseCases
    let join_room_usecase = Arc::new(JoinRoomUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        room_locks.clone(),
        clock.clone(),
    ));
    let leave_room_usecase = Arc::new(LeaveRoomUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        room_locks.clone(),
    ));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        chat_store.clone(),
        clock.clone(),
        config.max_chat_len,
    ));
    let connect_participant_usecase = Arc::new(ConnectParticipantUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        verifier,
        leave_room_usecase.clone(),
        clock.clone(),
    ));
    let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        leave_room_usecase.clone(),
    ));
    let route_message_usecase = Arc::new(RouteMessageUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        join_room_usecase,
        leave_room_usecase,
        send_message_usecase,
        room_locks,
        clock,
    ));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(repository.clone()));
    let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(repository));
    let get_chat_history_usecase = Arc::new(GetChatHistoryUseCase::new(chat_store));

    // 5. Create AppState
    let app_state = AppState {
        connect_participant_usecase,
        disconnect_participant_usecase,
        route_message_usecase,
        get_rooms_usecase,
        get_room_detail_usecase,
        get_chat_history_usecase,
        shutdown: Arc::new(ShutdownCoordinator::new(config.drain_timeout())),
        outbound_queue_capacity: config.outbound_queue_capacity(),
    };

    // 6. Create and run the server
    let server = Server::new(app_state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
