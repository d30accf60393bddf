//! メッセージ送信（通知）の抽象化
//!
//! UseCase 層はこの trait を通してクライアントへメッセージを届ける。
//! 送信は接続ごとの有界キューへの非ブロッキング投入で行い、
//! 遅い受信者が他の受信者への配信を止めないようにする。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionKey, Identity, MessagePushError};

/// クライアントへの送信チャンネル（有界）
pub type PusherChannel = mpsc::Sender<String>;

/// ブロードキャスト結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// キューに投入できた数
    pub delivered: usize,
    /// キュー満杯・未登録などで届けられなかった数
    pub dropped: usize,
    /// 連続破棄の上限を超えて切断対象になったクライアント
    pub evicted: Vec<Identity>,
}

/// MessagePusher trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// クライアントを登録（同じ Identity の既存 sender は破棄される）
    async fn register_client(&self, key: ConnectionKey, sender: PusherChannel);

    /// クライアントを登録解除（世代が一致する場合のみ）
    async fn unregister_client(&self, key: &ConnectionKey);

    /// 特定のクライアントに送信
    async fn push_to(&self, identity: &Identity, content: &str) -> Result<(), MessagePushError>;

    /// 複数のクライアントに送信（一部の失敗は許容）
    async fn broadcast(
        &self,
        targets: Vec<Identity>,
        content: &str,
    ) -> Result<BroadcastReport, MessagePushError>;
}
