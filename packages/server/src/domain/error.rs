//! ドメイン層のエラー型

use tegaki_shared::error::ValidationError;
use thiserror::Error;

/// Value Object の生成エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("invalid room id: {0}")]
    InvalidRoomId(#[from] ValidationError),

    #[error("chat text is empty after sanitization")]
    EmptyChatText,
}

/// Repository 操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// 接続が登録されていない、または新しい接続に置き換えられている
    #[error("connection '{0}' is not registered")]
    StaleConnection(String),

    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("'{identity}' is not a member of room '{room_id}'")]
    NotAMember { identity: String, room_id: String },
}

/// MessagePusher のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("client '{0}' not found")]
    ClientNotFound(String),

    /// 送信キューが満杯（メッセージは破棄された）
    #[error("outbound queue for '{0}' is full")]
    QueueFull(String),

    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// ChatStore のエラー
#[derive(Debug, Error)]
pub enum ChatStoreError {
    #[error("chat store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chat record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// 認証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("credential is missing")]
    MissingCredential,

    #[error("credential is invalid: {0}")]
    InvalidCredential(String),

    #[error("credential has no usable identity")]
    MissingIdentity,
}
