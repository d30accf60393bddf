//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{AuthError, RepositoryError, ValueObjectError};

/// 接続（ハンドシェイク）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
}

/// ルーム操作のルーティングエラー
///
/// いずれも送信者の接続を切る理由にはならない（ログに残して破棄する）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("'{identity}' has not joined room '{room_id}'")]
    NotAMember { identity: String, room_id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ValueObjectError),

    #[error("failed to encode outbound message: {0}")]
    Encoding(String),
}

impl From<serde_json::Error> for RouteError {
    fn from(e: serde_json::Error) -> Self {
        RouteError::Encoding(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("invalid room id: {0}")]
    InvalidRoomId(#[from] ValueObjectError),

    #[error("room not found")]
    RoomNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetChatHistoryError {
    #[error("invalid room id: {0}")]
    InvalidRoomId(#[from] ValueObjectError),

    #[error("chat store error: {0}")]
    Store(String),
}
