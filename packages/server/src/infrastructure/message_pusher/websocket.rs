//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの有界送信キュー（`mpsc::Sender`）を管理
//! - クライアントへのメッセージ送信（push_to, broadcast）
//! - バックプレッシャー: キューが満杯なら破棄し、連続破棄が上限に達したら切断
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された sender を受け取り、メッセージ送信に使用します。
//! sender を破棄するとソケット側の送信ループが終了し、通常の切断処理が走ります。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc::error::TrySendError};

use crate::domain::{
    BroadcastReport, ConnectionId, ConnectionKey, Identity, MessagePushError, MessagePusher,
    PusherChannel,
};

/// 連続破棄数の既定の上限
pub const DEFAULT_MAX_CONSECUTIVE_DROPS: usize = 32;

struct ClientSlot {
    connection_id: ConnectionId,
    sender: PusherChannel,
    consecutive_drops: usize,
}

enum Delivery {
    Queued,
    Dropped,
    Evicted,
}

/// WebSocket を使った MessagePusher 実装
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの送信キュー
    clients: Mutex<HashMap<Identity, ClientSlot>>,
    max_consecutive_drops: usize,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    ///
    /// `max_consecutive_drops` 回続けてキュー満杯で破棄されたクライアントは切断される。
    pub fn new(max_consecutive_drops: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_consecutive_drops: max_consecutive_drops.max(1),
        }
    }

    /// 登録中のクライアント数
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    fn deliver(&self, identity: &Identity, slot: &mut ClientSlot, content: &str) -> Delivery {
        match slot.sender.try_send(content.to_string()) {
            Ok(()) => {
                slot.consecutive_drops = 0;
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                slot.consecutive_drops += 1;
                tracing::warn!(
                    "Outbound queue for '{}' is full, dropped message ({} in a row)",
                    identity,
                    slot.consecutive_drops
                );
                if slot.consecutive_drops >= self.max_consecutive_drops {
                    Delivery::Evicted
                } else {
                    Delivery::Dropped
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Outbound queue for '{}' is closed", identity);
                Delivery::Evicted
            }
        }
    }
}

impl Default for WebSocketMessagePusher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSECUTIVE_DROPS)
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, key: ConnectionKey, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        let previous = clients.insert(
            key.identity.clone(),
            ClientSlot {
                connection_id: key.connection_id,
                sender,
                consecutive_drops: 0,
            },
        );
        if previous.is_some() {
            tracing::info!("Client '{}' replaced an existing connection", key.identity);
        }
        tracing::debug!("Client '{}' registered to MessagePusher", key);
    }

    async fn unregister_client(&self, key: &ConnectionKey) {
        let mut clients = self.clients.lock().await;
        let is_current = clients
            .get(&key.identity)
            .is_some_and(|slot| slot.connection_id == key.connection_id);
        if is_current {
            clients.remove(&key.identity);
            tracing::debug!("Client '{}' unregistered from MessagePusher", key);
        }
    }

    async fn push_to(&self, identity: &Identity, content: &str) -> Result<(), MessagePushError> {
        let mut clients = self.clients.lock().await;
        let slot = clients
            .get_mut(identity)
            .ok_or_else(|| MessagePushError::ClientNotFound(identity.to_string()))?;

        match self.deliver(identity, slot, content) {
            Delivery::Queued => {
                tracing::debug!("Pushed message to client '{}'", identity);
                Ok(())
            }
            Delivery::Dropped => Err(MessagePushError::QueueFull(identity.to_string())),
            Delivery::Evicted => {
                clients.remove(identity);
                tracing::warn!("Evicted client '{}'", identity);
                Err(MessagePushError::PushFailed(format!(
                    "client '{}' evicted",
                    identity
                )))
            }
        }
    }

    async fn broadcast(
        &self,
        targets: Vec<Identity>,
        content: &str,
    ) -> Result<BroadcastReport, MessagePushError> {
        let mut clients = self.clients.lock().await;
        let mut report = BroadcastReport::default();

        for target in targets {
            let Some(slot) = clients.get_mut(&target) else {
                tracing::warn!("Client '{}' not found during broadcast, skipping", target);
                report.dropped += 1;
                continue;
            };
            // ブロードキャストでは一部の送信失敗を許容
            match self.deliver(&target, slot, content) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Dropped => report.dropped += 1,
                Delivery::Evicted => {
                    clients.remove(&target);
                    tracing::warn!("Evicted client '{}'", target);
                    report.dropped += 1;
                    report.evicted.push(target);
                }
            }
        }

        Ok(report)
    }
}
