//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! 接続テーブルとルームレジストリを 1 つの Mutex で保護し、
//! 参加・退出で両側を同時に更新します。
//!
//! キャンバスの状態はメモリ上にのみ保持され、サーバー再起動で失われます。

use std::collections::HashMap;

use async_trait::async_trait;
use tegaki_shared::canvas::{CanvasData, ShapeOp};
use tokio::sync::Mutex;

use crate::domain::{
    Connection, ConnectionKey, Departure, Identity, JoinOutcome, Registration, RepositoryError,
    Room, RoomId, RoomRepository, Timestamp,
};

#[derive(Debug, Default)]
struct RegistryState {
    connections: HashMap<Identity, Connection>,
    rooms: HashMap<RoomId, Room>,
}

impl RegistryState {
    fn connection_mut(&mut self, key: &ConnectionKey) -> Result<&mut Connection, RepositoryError> {
        self.connections
            .get_mut(&key.identity)
            .filter(|c| c.connection_id == key.connection_id)
            .ok_or_else(|| RepositoryError::StaleConnection(key.to_string()))
    }

    /// `identity` を `room_id` のメンバーから外す。空になったルームは破棄する。
    fn remove_member(&mut self, identity: &Identity, room_id: &RoomId) -> Option<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        let display_name = room.remove_member(identity)?;
        let member_count = room.member_count();
        let room_removed = room.is_empty();
        if room_removed {
            self.rooms.remove(room_id);
            tracing::debug!("Room '{}' is empty and was removed", room_id);
        }
        Some(Departure {
            room_id: room_id.clone(),
            identity: identity.clone(),
            display_name,
            member_count,
            room_removed,
        })
    }

    fn release_all(&mut self, connection: &Connection) -> Vec<Departure> {
        connection
            .rooms
            .iter()
            .filter_map(|room_id| self.remove_member(&connection.identity, room_id))
            .collect()
    }
}

/// インメモリ Room Repository 実装
#[derive(Debug, Default)]
pub struct InMemoryRoomRepository {
    state: Mutex<RegistryState>,
}

impl InMemoryRoomRepository {
    /// 新しい InMemoryRoomRepository を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn register_connection(&self, connection: Connection) -> Registration {
        let mut state = self.state.lock().await;
        let replaced = state
            .connections
            .insert(connection.identity.clone(), connection);
        let departures = match &replaced {
            Some(previous) => state.release_all(previous),
            None => Vec::new(),
        };
        Registration {
            replaced,
            departures,
        }
    }

    async fn unregister_connection(
        &self,
        key: &ConnectionKey,
    ) -> Result<Vec<Departure>, RepositoryError> {
        let mut state = self.state.lock().await;
        state.connection_mut(key)?;
        let connection = state
            .connections
            .remove(&key.identity)
            .ok_or_else(|| RepositoryError::StaleConnection(key.to_string()))?;
        Ok(state.release_all(&connection))
    }

    async fn get_connection(&self, identity: &Identity) -> Option<Connection> {
        let state = self.state.lock().await;
        state.connections.get(identity).cloned()
    }

    async fn touch(&self, key: &ConnectionKey, now: Timestamp) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state.connection_mut(key)?.last_activity = now;
        Ok(())
    }

    async fn join(
        &self,
        key: &ConnectionKey,
        room_id: &RoomId,
        now: Timestamp,
    ) -> Result<JoinOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = state.connection_mut(key)?;
        connection.rooms.insert(room_id.clone());
        let display_name = connection.display_name.clone();

        let room = state
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone(), now));
        let newly_joined = room.add_member(key.identity.clone(), display_name);

        Ok(JoinOutcome {
            room: room.clone(),
            newly_joined,
        })
    }

    async fn leave(
        &self,
        key: &ConnectionKey,
        room_id: &RoomId,
    ) -> Result<Option<Departure>, RepositoryError> {
        let mut state = self.state.lock().await;
        let connection = state.connection_mut(key)?;
        if !connection.rooms.remove(room_id) {
            return Ok(None);
        }
        Ok(state.remove_member(&key.identity, room_id))
    }

    async fn apply_shape_op(
        &self,
        room_id: &RoomId,
        op: ShapeOp,
        now: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        room.apply(op, now);
        Ok(())
    }

    async fn replace_canvas(
        &self,
        room_id: &RoomId,
        data: CanvasData,
        now: Timestamp,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        room.replace_canvas(data, now);
        Ok(())
    }

    async fn is_member(&self, key: &ConnectionKey, room_id: &RoomId) -> bool {
        let state = self.state.lock().await;
        state
            .connections
            .get(&key.identity)
            .is_some_and(|c| c.matches(key) && c.rooms.contains(room_id))
    }

    async fn members(&self, room_id: &RoomId) -> Vec<Identity> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .map(|room| room.members.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))
    }

    async fn list_rooms(&self) -> Vec<Room> {
        let state = self.state.lock().await;
        let mut rooms: Vec<Room> = state.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        rooms
    }

    async fn count_connections(&self) -> usize {
        let state = self.state.lock().await;
        state.connections.len()
    }
}
