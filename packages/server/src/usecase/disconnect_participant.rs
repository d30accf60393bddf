//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 切断時に参加していた全ルームから退出し、残りのメンバーに通知されること
//!
//! ### どのような状況を想定しているか
//! - 正常系：複数ルームに参加した接続の切断
//! - エッジケース：置き換え済みの古い接続の切断（何もしない）
//! - 置き換えと退去（eviction）の判別

use std::sync::Arc;

use crate::domain::{ConnectionKey, Departure, MessagePusher, RepositoryError, RoomRepository};

use super::leave_room::LeaveRoomUseCase;

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    leave_room: Arc<LeaveRoomUseCase>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        leave_room: Arc<LeaveRoomUseCase>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            leave_room,
        }
    }

    /// 参加者切断を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Departure>)` - 退出したルーム
    /// * `Err(RepositoryError::StaleConnection)` - 既に置き換え・削除済みの接続
    pub async fn execute(&self, key: &ConnectionKey) -> Result<Vec<Departure>, RepositoryError> {
        // 1. MessagePusher から登録解除（世代が一致する場合のみ）
        self.message_pusher.unregister_client(key).await;

        // 2. 接続テーブルから削除し、全ルームから退出
        let departures = self.repository.unregister_connection(key).await?;

        // 3. 残りのメンバーに通知
        self.leave_room.announce_departures(&departures).await;

        tracing::info!(
            "'{}' disconnected (left {} rooms)",
            key.identity,
            departures.len()
        );
        Ok(departures)
    }

    /// 同じ Identity の新しい接続に置き換えられたかを判定する
    ///
    /// 接続テーブルには置き換え後の接続が先に登録されるため、
    /// 送信キューが閉じた時点で判定できる。
    pub async fn is_replaced(&self, key: &ConnectionKey) -> bool {
        self.repository
            .get_connection(&key.identity)
            .await
            .is_some_and(|connection| !connection.matches(key))
    }
}
