//! UseCase: チャットメッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - 本文のサニタイズ、送信者以外のメンバーへのブロードキャスト、永続化の非同期実行
//!
//! ### なぜこのテストが必要か
//! - 永続化の失敗がライブ配信に影響しないことを保証
//! - 未参加のルームへのチャットが配信されないことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージ送信とブロードキャスト、ChatStore への追記
//! - 異常系：ChatStore の書き込み失敗、未参加のルームへの送信
//! - エッジケース：サニタイズ後に空になる本文

use std::sync::Arc;

use tegaki_shared::time::Clock;
use tokio::task::JoinHandle;

use crate::domain::{
    BroadcastReport, ChatMessage, ChatStore, ChatText, Identity, MessagePusher, Participant,
    RoomId, RoomRepository, Timestamp,
};

use super::{error::RouteError, notification};

/// チャット送信の結果
#[derive(Debug)]
pub struct ChatDispatch {
    pub report: BroadcastReport,
    /// 永続化タスク（完了を待つ必要はない）
    pub persistence: JoinHandle<()>,
}

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// ChatStore（チャット永続化の抽象化）
    chat_store: Arc<dyn ChatStore>,
    clock: Arc<dyn Clock>,
    max_chat_len: usize,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        chat_store: Arc<dyn ChatStore>,
        clock: Arc<dyn Clock>,
        max_chat_len: usize,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            chat_store,
            clock,
            max_chat_len,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `sender` - 送信者
    /// * `room_id` - 送信先のルーム（参加済みであること）
    /// * `raw_text` - サニタイズ前の本文
    pub async fn execute(
        &self,
        sender: &Participant,
        room_id: RoomId,
        raw_text: &str,
    ) -> Result<ChatDispatch, RouteError> {
        // 1. 本文をサニタイズ
        let text = ChatText::new(raw_text, self.max_chat_len)?;

        // 2. 参加チェック
        if !self.repository.is_member(&sender.key, &room_id).await {
            return Err(RouteError::NotAMember {
                identity: sender.identity().to_string(),
                room_id: room_id.into_string(),
            });
        }

        let message = ChatMessage {
            room_id: room_id.clone(),
            author: sender.identity().clone(),
            display_name: sender.display_name.clone(),
            text,
            timestamp: Timestamp::new(self.clock.now_millis()),
        };

        // 3. 送信者以外のメンバーにブロードキャスト
        let json = notification::chat(&message).to_json()?;
        let targets = self.broadcast_targets(&room_id, sender.identity()).await;
        let report = self
            .message_pusher
            .broadcast(targets, &json)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to broadcast chat: {}", e);
                BroadcastReport::default()
            });

        // 4. 永続化は配信と独立に実行（失敗はログのみ）
        let chat_store = self.chat_store.clone();
        let persistence = tokio::spawn(async move {
            let room_id = message.room_id.clone();
            if let Err(e) = chat_store.append(message).await {
                tracing::warn!("Failed to persist chat message in '{}': {}", room_id, e);
            }
        });

        Ok(ChatDispatch {
            report,
            persistence,
        })
    }

    /// 送信者以外のメンバーを返す
    async fn broadcast_targets(&self, room_id: &RoomId, exclude: &Identity) -> Vec<Identity> {
        self.repository
            .members(room_id)
            .await
            .into_iter()
            .filter(|id| id != exclude)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChatStoreError, MockChatStore},
        infrastructure::chat_store::InMemoryChatStore,
        usecase::test_support::{Harness, drain, room_id},
    };
    use tegaki_shared::protocol::ProtocolMessage;

    #[tokio::test]
    async fn test_chat_is_sanitized_and_broadcast_to_others() {
        // テスト項目: サニタイズ済みのチャットが送信者以外に届き、永続化される
        // given (前提条件):
        let harness = Harness::new();
        let store = Arc::new(InMemoryChatStore::default());
        let usecase = harness.send_message(store.clone());
        let (alice, mut alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        let join = harness.join_room();
        join.execute(&alice, room_id("demo")).await.unwrap();
        join.execute(&bob, room_id("demo")).await.unwrap();
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        // when (操作):
        let dispatch = usecase
            .execute(&alice, room_id("demo"), "hi\u{7}   there ")
            .await
            .unwrap();
        dispatch.persistence.await.unwrap();

        // then (期待する結果):
        assert_eq!(dispatch.report.delivered, 1);
        assert_eq!(
            drain(&mut bob_rx),
            vec![ProtocolMessage::Chat {
                room_id: "demo".to_string(),
                text: "hi  there".to_string(),
                user_id: Some("alice".to_string()),
                display_name: Some("alice".to_string()),
                timestamp: Some(Harness::NOW),
            }]
        );
        assert!(drain(&mut alice_rx).is_empty());
        let stored = store.recent(&room_id("demo"), 50).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text.as_str(), "hi  there");
    }

    #[tokio::test]
    async fn test_store_failure_does_not_affect_delivery() {
        // テスト項目: 永続化に失敗してもライブ配信は行われる
        // given (前提条件):
        let harness = Harness::new();
        let mut store = MockChatStore::new();
        store.expect_append().times(1).returning(|_| {
            Err(ChatStoreError::Io(std::io::Error::other("disk full")))
        });
        let usecase = harness.send_message(Arc::new(store));
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        let join = harness.join_room();
        join.execute(&alice, room_id("demo")).await.unwrap();
        join.execute(&bob, room_id("demo")).await.unwrap();
        drain(&mut bob_rx);

        // when (操作):
        let dispatch = usecase
            .execute(&alice, room_id("demo"), "hello")
            .await
            .unwrap();
        dispatch.persistence.await.unwrap();

        // then (期待する結果):
        assert!(matches!(
            drain(&mut bob_rx).as_slice(),
            [ProtocolMessage::Chat { .. }]
        ));
    }

    #[tokio::test]
    async fn test_chat_to_room_not_joined_is_rejected() {
        // テスト項目: 参加していないルームへのチャットは配信されない
        // given (前提条件):
        let harness = Harness::new();
        let mut store = MockChatStore::new();
        store.expect_append().never();
        let usecase = harness.send_message(Arc::new(store));
        let (alice, _alice_rx) = harness.connect("alice").await;
        let (bob, mut bob_rx) = harness.connect("bob").await;
        harness.join_room().execute(&bob, room_id("demo")).await.unwrap();
        drain(&mut bob_rx);

        // when (操作):
        let result = usecase.execute(&alice, room_id("demo"), "sneaky").await;

        // then (期待する結果):
        assert!(matches!(result, Err(RouteError::NotAMember { .. })));
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_blank_chat_is_rejected() {
        // テスト項目: サニタイズ後に空になる本文は送信されない
        // given (前提条件):
        let harness = Harness::new();
        let usecase = harness.send_message(Arc::new(InMemoryChatStore::default()));
        let (alice, _alice_rx) = harness.connect("alice").await;
        harness.join_room().execute(&alice, room_id("demo")).await.unwrap();

        // when (操作):
        let result = usecase.execute(&alice, room_id("demo"), " \u{1b} ").await;

        // then (期待する結果):
        assert!(matches!(result, Err(RouteError::InvalidPayload(_))));
    }
}
