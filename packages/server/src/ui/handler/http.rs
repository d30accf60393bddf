//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::{
    infrastructure::dto::http::{
        ChatHistoryDto, ChatHistoryItemDto, RoomDetailDto, RoomSnapshotDto, RoomSummaryDto,
    },
    ui::state::AppState,
    usecase::{GetChatHistoryError, GetRoomDetailError},
};

fn room_detail_status(e: GetRoomDetailError) -> StatusCode {
    match e {
        GetRoomDetailError::InvalidRoomId(_) => StatusCode::BAD_REQUEST,
        GetRoomDetailError::RoomNotFound => StatusCode::NOT_FOUND,
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of live rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.get_rooms_usecase.execute().await;

    // Domain Model から DTO への変換
    Json(rooms.iter().map(RoomSummaryDto::from).collect())
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    state
        .get_room_detail_usecase
        .execute(room_id)
        .await
        .map(|room| Json(RoomDetailDto::from(&room)))
        .map_err(room_detail_status)
}

/// Debug endpoint returning the full room snapshot
pub async fn debug_room_snapshot(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshotDto>, StatusCode> {
    state
        .get_room_detail_usecase
        .execute(room_id)
        .await
        .map(|room| Json(RoomSnapshotDto::from(&room)))
        .map_err(room_detail_status)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Recent chat history of a room (oldest first)
pub async fn get_chat_history(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ChatHistoryDto>, StatusCode> {
    match state
        .get_chat_history_usecase
        .execute(room_id.clone(), query.limit)
        .await
    {
        Ok(messages) => Ok(Json(ChatHistoryDto {
            room_id,
            messages: messages
                .into_iter()
                .map(ChatHistoryItemDto::from)
                .collect(),
        })),
        Err(GetChatHistoryError::InvalidRoomId(_)) => Err(StatusCode::BAD_REQUEST),
        Err(GetChatHistoryError::Store(e)) => {
            tracing::error!("Failed to read chat history: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
