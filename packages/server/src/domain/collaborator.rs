//! 外部コラボレーターの抽象化
//!
//! - `CredentialVerifier`: ハンドシェイク時のアクセストークン検証
//! - `ChatStore`: チャットメッセージの永続化（ファイア・アンド・フォーゲット）

use async_trait::async_trait;

use super::{AuthError, ChatMessage, ChatStoreError, DisplayName, Identity, RoomId};

/// 検証済みユーザー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub identity: Identity,
    pub display_name: DisplayName,
}

/// アクセストークン検証
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedUser, AuthError>;
}

/// チャットの永続化ストア
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// メッセージを追記
    async fn append(&self, message: ChatMessage) -> Result<(), ChatStoreError>;

    /// ルームの直近 `limit` 件（古い順）
    async fn recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatStoreError>;
}
