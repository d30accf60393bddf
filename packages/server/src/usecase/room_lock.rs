//! ルーム単位の排他制御
//!
//! 同じルームに対する join / leave / 図形操作とその通知を 1 つずつ実行する。
//! 別のルームの操作は並行して進む。使われなくなったロックはガード解放時に回収される。

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::RoomId;

#[derive(Debug, Default)]
pub struct RoomLocks {
    locks: DashMap<RoomId, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルームのロックを取得する（取得できるまで待つ）
    pub async fn lock(&self, room_id: &RoomId) -> RoomGuard<'_> {
        let mutex = self.locks.entry(room_id.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        RoomGuard {
            locks: self,
            room_id: room_id.clone(),
            guard: Some(guard),
        }
    }

    /// 保持しているロックの数
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct RoomGuard<'a> {
    locks: &'a RoomLocks,
    room_id: RoomId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RoomGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // 待機者がいなければ回収
        self.locks
            .locks
            .remove_if(&self.room_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
