//! UseCase: ルーム参加処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinRoomUseCase::execute() メソッド
//! - 参加者本人へのスナップショット送信と、他メンバーへの member_joined 通知
//!
//! ### なぜこのテストが必要か
//! - 後から参加したクライアントが現在のキャンバスを受け取れることを保証
//! - 参加済みのルームへの再 join でも通知が行われる（冪等）ことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：空のルームへの参加、既存メンバーがいるルームへの参加
//! - エッジケース：同じルームへの 2 回目の参加

use std::sync::Arc;

use tegaki_shared::time::Clock;

use crate::domain::{
    Identity, JoinOutcome, MessagePusher, Participant, RoomId, RoomRepository, Timestamp,
};

use super::{error::RouteError, notification, room_lock::RoomLocks};

/// ルーム参加のユースケース
pub struct JoinRoomUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    room_locks: Arc<RoomLocks>,
    clock: Arc<dyn Clock>,
}

impl JoinRoomUseCase {
    /// 新しい JoinRoomUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        room_locks: Arc<RoomLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            room_locks,
            clock,
        }
    }

    /// ルーム参加を実行
    ///
    /// # Returns
    ///
    /// * `Ok(JoinOutcome)` - 参加後のルームと、新規参加かどうか
    /// * `Err(RouteError)` - 接続が置き換え済みなど
    pub async fn execute(
        &self,
        participant: &Participant,
        room_id: RoomId,
    ) -> Result<JoinOutcome, RouteError> {
        let _guard = self.room_locks.lock(&room_id).await;
        let now = Timestamp::new(self.clock.now_millis());

        // 1. Repository でメンバーに追加（ルームが無ければ作成）
        let outcome = self.repository.join(&participant.key, &room_id, now).await?;

        // 2. 本人に現在のスナップショットを送信
        let snapshot = notification::room_state(&outcome.room).to_json()?;
        if let Err(e) = self
            .message_pusher
            .push_to(participant.identity(), &snapshot)
            .await
        {
            tracing::warn!(
                "Failed to send room state of '{}' to '{}': {}",
                room_id,
                participant.identity(),
                e
            );
        }

        // 3. 他のメンバーに member_joined を通知（再 join でも通知する）
        let member_count = outcome.room.member_count();
        let joined = notification::member_joined(&room_id, participant, member_count).to_json()?;
        let targets: Vec<Identity> = outcome
            .room
            .members
            .keys()
            .filter(|id| *id != participant.identity())
            .cloned()
            .collect();
        if let Err(e) = self.message_pusher.broadcast(targets, &joined).await {
            tracing::warn!("Failed to broadcast member_joined: {}", e);
        }

        tracing::info!(
            "'{}' joined room '{}' ({} members)",
            participant.identity(),
            room_id,
            member_count
        );

        Ok(outcome)
    }
}
