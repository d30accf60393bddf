//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};
use tegaki_shared::canvas::{Shape, Viewport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub user_id: String,
    pub display_name: String,
}

/// `GET /api/rooms` の要素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub id: String,
    pub member_count: usize,
    pub shape_count: usize,
    pub created_at: String,
}

/// `GET /api/rooms/{room_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailDto {
    pub id: String,
    pub members: Vec<MemberDto>,
    pub shape_count: usize,
    pub viewport: Viewport,
    pub created_at: String,
    pub last_modified: String,
}

/// `GET /debug/rooms/{room_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshotDto {
    pub id: String,
    pub members: Vec<MemberDto>,
    pub shapes: Vec<Shape>,
    pub viewport: Viewport,
    pub last_modified: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryItemDto {
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub timestamp: i64,
    pub sent_at: String,
}

/// `GET /api/rooms/{room_id}/chats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryDto {
    pub room_id: String,
    pub messages: Vec<ChatHistoryItemDto>,
}
