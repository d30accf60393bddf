//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::authenticate() / execute() メソッド
//! - トークン検証と、接続テーブル・MessagePusher への登録
//!
//! ### なぜこのテストが必要か
//! - 検証に失敗した接続がプロトコルのやり取りに入らないことを保証
//! - 同じ Identity の 2 本目の接続が 1 本目を置き換える（後勝ち）ことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規接続
//! - 異常系：トークン無し・不正なトークン
//! - エッジケース：同じ Identity での再接続（古い接続の参加ルームに member_left が届く）

use std::sync::Arc;

use tegaki_shared::time::Clock;

use crate::domain::{
    AuthError, Connection, ConnectionId, CredentialVerifier, MessagePusher, Participant,
    PusherChannel, RoomRepository, Timestamp, VerifiedUser,
};

use super::{error::ConnectError, leave_room::LeaveRoomUseCase};

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn RoomRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// CredentialVerifier（トークン検証の抽象化）
    verifier: Arc<dyn CredentialVerifier>,
    leave_room: Arc<LeaveRoomUseCase>,
    clock: Arc<dyn Clock>,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        verifier: Arc<dyn CredentialVerifier>,
        leave_room: Arc<LeaveRoomUseCase>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            verifier,
            leave_room,
            clock,
        }
    }

    /// アクセストークンを検証する（WebSocket へのアップグレード前に呼ぶ）
    pub fn authenticate(&self, token: Option<&str>) -> Result<VerifiedUser, ConnectError> {
        let token = token.ok_or(AuthError::MissingCredential)?;
        Ok(self.verifier.verify(token)?)
    }

    /// 参加者接続を実行
    ///
    /// 同じ Identity の接続が既にあれば置き換える。古い接続の送信キューは破棄され
    /// （ソケットが閉じる）、参加していたルームには member_left が通知される。
    ///
    /// # Arguments
    ///
    /// * `user` - 検証済みのユーザー
    /// * `sender` - クライアントへのメッセージ送信用チャンネル
    pub async fn execute(&self, user: VerifiedUser, sender: PusherChannel) -> Participant {
        let now = Timestamp::new(self.clock.now_millis());
        let connection = Connection::new(
            user.identity,
            user.display_name.clone(),
            ConnectionId::generate(),
            now,
        );
        let participant = Participant::new(connection.key(), user.display_name);

        // 1. 接続テーブルに登録（既存接続は置き換え）
        let registration = self.repository.register_connection(connection).await;

        // 2. MessagePusher に登録（既存の sender は破棄される）
        self.message_pusher
            .register_client(participant.key.clone(), sender)
            .await;

        // 3. 置き換えで解放されたルームに通知
        if let Some(previous) = registration.replaced {
            tracing::info!(
                "'{}' reconnected; replaced connection {}",
                participant.identity(),
                previous.connection_id
            );
            self.leave_room
                .announce_departures(&registration.departures)
                .await;
        }

        participant
    }
}
