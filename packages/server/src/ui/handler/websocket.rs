//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use tegaki_shared::{
    error::DecodeError,
    protocol::{REPLACED_CLOSE_CODE, decode_message},
};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionKey, Participant, RepositoryError, RoomCommand, VerifiedUser},
    ui::state::AppState,
};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct ConnectQuery {
    /// Access token for clients that cannot set headers (browsers)
    pub token: Option<String>,
}

/// Extract the bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    if state.shutdown.is_shutting_down() {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // The credential is verified before the upgrade; a rejected client never
    // gets a socket.
    let token = bearer_token(&headers).or(query.token.as_deref());
    let user = match state.connect_participant_usecase.authenticate(token) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!("Rejected WebSocket handshake: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    tracing::debug!("Upgrading connection for '{}'", user.identity);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Spawns a task that drains this connection's outbound queue into the socket.
///
/// The loop ends when the queue is closed (the connection was replaced or
/// evicted) or the socket fails. A closed queue is answered with a close
/// frame naming the cause. On shutdown the remaining queued messages are
/// flushed and a close frame is sent.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    state: Arc<AppState>,
    key: ConnectionKey,
) -> tokio::task::JoinHandle<()> {
    let mut shutdown = state.shutdown.listener();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let frame = queue_closed_frame(&state, &key).await;
                        tracing::info!("Closing {} ({})", key, frame.reason.as_str());
                        let _ = sender.send(Message::Close(Some(frame))).await;
                        break;
                    };
                    if sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.triggered() => {
                    rx.close();
                    while let Some(msg) = rx.recv().await {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            return;
                        }
                    }
                    let _ = sender
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "server shutting down".into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    })
}

/// Close frame for a connection whose outbound queue was dropped.
async fn queue_closed_frame(state: &AppState, key: &ConnectionKey) -> CloseFrame {
    if state.disconnect_participant_usecase.is_replaced(key).await {
        CloseFrame {
            code: REPLACED_CLOSE_CODE,
            reason: "replaced".into(),
        }
    } else {
        CloseFrame {
            code: close_code::POLICY,
            reason: "evicted".into(),
        }
    }
}

async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    state: Arc<AppState>,
    participant: Participant,
) {
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("WebSocket error for '{}': {}", participant.identity(), e);
                break;
            }
        };

        match msg {
            Message::Text(text) => dispatch(&state, &participant, text.as_str()).await,
            Message::Close(_) => {
                tracing::info!("Client '{}' requested close", participant.identity());
                break;
            }
            Message::Binary(_) => {
                tracing::debug!("Ignoring binary frame from '{}'", participant.identity());
            }
            // Ping/pong frames are answered by the WebSocket layer
            _ => {}
        }
    }
}

/// Decode one text frame and hand it to the router.
///
/// Nothing here closes the connection: bad frames are logged and dropped.
async fn dispatch(state: &AppState, participant: &Participant, text: &str) {
    let message = match decode_message(text) {
        Ok(message) => message,
        Err(DecodeError::UnknownKind(kind)) => {
            tracing::debug!(
                "Ignoring unknown message type '{}' from '{}'",
                kind,
                participant.identity()
            );
            return;
        }
        Err(e) => {
            tracing::warn!(
                "Dropping malformed message from '{}': {}",
                participant.identity(),
                e
            );
            return;
        }
    };

    let command = match RoomCommand::try_from(message) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(
                "Dropping message from '{}': {}",
                participant.identity(),
                e
            );
            return;
        }
    };

    match state
        .route_message_usecase
        .execute(participant, command)
        .await
    {
        Ok(outcome) => {
            tracing::debug!("Routed message from '{}': {:?}", participant.identity(), outcome);
        }
        Err(e) => {
            tracing::warn!("Dropped message from '{}': {}", participant.identity(), e);
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: VerifiedUser) {
    let _active = state.shutdown.track();

    let (tx, rx) = mpsc::channel(state.outbound_queue_capacity);
    let participant = state.connect_participant_usecase.execute(user, tx).await;
    tracing::info!(
        "Client '{}' connected ({})",
        participant.identity(),
        participant.key.connection_id
    );

    let (sender, receiver) = socket.split();

    let mut send_task = pusher_loop(rx, sender, state.clone(), participant.key.clone());
    let mut recv_task = tokio::spawn(receive_loop(receiver, state.clone(), participant.clone()));

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    match state
        .disconnect_participant_usecase
        .execute(&participant.key)
        .await
    {
        Ok(departures) => {
            tracing::debug!(
                "Cleaned up '{}' ({} rooms released)",
                participant.key,
                departures.len()
            );
        }
        Err(RepositoryError::StaleConnection(_)) => {
            tracing::debug!(
                "Connection {} was replaced; nothing to clean up",
                participant.key
            );
        }
        Err(e) => {
            tracing::warn!("Failed to disconnect '{}': {}", participant.key, e);
        }
    }
}
