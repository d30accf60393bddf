//! UseCase: チャット履歴取得

use std::sync::Arc;

use crate::domain::{ChatMessage, ChatStore, RoomId};

use super::error::GetChatHistoryError;

/// 件数指定が無い場合の取得件数
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// 1 回の取得件数の上限
pub const MAX_HISTORY_LIMIT: usize = 500;

pub struct GetChatHistoryUseCase {
    chat_store: Arc<dyn ChatStore>,
}

impl GetChatHistoryUseCase {
    pub fn new(chat_store: Arc<dyn ChatStore>) -> Self {
        Self { chat_store }
    }

    /// 直近のメッセージを古い順で返す
    pub async fn execute(
        &self,
        room_id: String,
        limit: Option<usize>,
    ) -> Result<Vec<ChatMessage>, GetChatHistoryError> {
        let room_id = RoomId::new(room_id)?;
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.chat_store
            .recent(&room_id, limit)
            .await
            .map_err(|e| GetChatHistoryError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockChatStore;

    #[tokio::test]
    async fn test_default_and_capped_limits() {
        // テスト項目: 件数未指定は 50 件、上限を超える指定は 500 件に丸められる
        // given (前提条件):
        let mut store = MockChatStore::new();
        store
            .expect_recent()
            .withf(|_, limit| *limit == DEFAULT_HISTORY_LIMIT)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        store
            .expect_recent()
            .withf(|_, limit| *limit == MAX_HISTORY_LIMIT)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        let usecase = GetChatHistoryUseCase::new(Arc::new(store));

        // when (操作):
        let default = usecase.execute("demo".to_string(), None).await;
        let capped = usecase.execute("demo".to_string(), Some(10_000)).await;

        // then (期待する結果):
        assert!(default.is_ok());
        assert!(capped.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_room_id_is_rejected() {
        // テスト項目: 不正なルーム ID はストアに問い合わせずにエラーになる
        // given (前提条件):
        let mut store = MockChatStore::new();
        store.expect_recent().never();
        let usecase = GetChatHistoryUseCase::new(Arc::new(store));

        // when (操作):
        let result = usecase.execute(String::new(), None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(GetChatHistoryError::InvalidRoomId(_))));
    }
}
