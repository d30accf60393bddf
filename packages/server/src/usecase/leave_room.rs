//! UseCase: ルーム退出処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveRoomUseCase::execute() メソッド
//! - 退出時の member_left 通知と、空になったルームの破棄
//!
//! ### どのような状況を想定しているか
//! - 正常系：他のメンバーが残るルームからの退出
//! - エッジケース：最後のメンバーの退出、参加していないルームからの退出

use std::sync::Arc;

use crate::domain::{BroadcastReport, Departure, MessagePusher, Participant, RoomId, RoomRepository};

use super::{error::RouteError, notification, room_lock::RoomLocks};

/// ルーム退出のユースケース
pub struct LeaveRoomUseCase {
    repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    room_locks: Arc<RoomLocks>,
}

impl LeaveRoomUseCase {
    /// 新しい LeaveRoomUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        room_locks: Arc<RoomLocks>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            room_locks,
        }
    }

    /// ルーム退出を実行
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Departure))` - 退出した
    /// * `Ok(None)` - そのルームに参加していなかった
    pub async fn execute(
        &self,
        participant: &Participant,
        room_id: RoomId,
    ) -> Result<Option<Departure>, RouteError> {
        let _guard = self.room_locks.lock(&room_id).await;

        let departure = self.repository.leave(&participant.key, &room_id).await?;
        if let Some(departure) = &departure {
            self.broadcast_departure(departure).await?;
            tracing::info!(
                "'{}' left room '{}' ({} members)",
                departure.identity,
                departure.room_id,
                departure.member_count
            );
        }
        Ok(departure)
    }

    /// 切断・置き換えで既に解放された参加について member_left を通知する
    pub async fn announce_departures(&self, departures: &[Departure]) {
        for departure in departures {
            let _guard = self.room_locks.lock(&departure.room_id).await;
            if let Err(e) = self.broadcast_departure(departure).await {
                tracing::warn!(
                    "Failed to announce departure of '{}' from '{}': {}",
                    departure.identity,
                    departure.room_id,
                    e
                );
            }
        }
    }

    /// 残りのメンバーに member_left をブロードキャスト
    async fn broadcast_departure(
        &self,
        departure: &Departure,
    ) -> Result<BroadcastReport, RouteError> {
        if departure.room_removed {
            return Ok(BroadcastReport::default());
        }
        let targets = self.repository.members(&departure.room_id).await;
        let left = notification::member_left(departure).to_json()?;
        let report = self.message_pusher.broadcast(targets, &left).await;
        Ok(report.unwrap_or_else(|e| {
            tracing::warn!("Failed to broadcast member_left: {}", e);
            BroadcastReport::default()
        }))
    }
}
