//! インメモリの ChatStore 実装

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, ChatStore, ChatStoreError, RoomId};

/// ルームごとに保持する件数の既定値
pub const DEFAULT_RETAINED_PER_ROOM: usize = 500;

/// ルームごとに直近のメッセージを保持するストア
///
/// 上限を超えた分は古いものから捨てる。
pub struct InMemoryChatStore {
    messages: Mutex<HashMap<RoomId, VecDeque<ChatMessage>>>,
    retained_per_room: usize,
}

impl InMemoryChatStore {
    pub fn new(retained_per_room: usize) -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            retained_per_room: retained_per_room.max(1),
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED_PER_ROOM)
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn append(&self, message: ChatMessage) -> Result<(), ChatStoreError> {
        let mut messages = self.messages.lock().await;
        let log = messages.entry(message.room_id.clone()).or_default();
        log.push_back(message);
        while log.len() > self.retained_per_room {
            log.pop_front();
        }
        Ok(())
    }

    async fn recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatStoreError> {
        let messages = self.messages.lock().await;
        let Some(log) = messages.get(room_id) else {
            return Ok(Vec::new());
        };
        let skip = log.len().saturating_sub(limit);
        Ok(log.iter().skip(skip).cloned().collect())
    }
}
