//! UseCase テスト用の組み立てヘルパー

use std::sync::Arc;

use tegaki_shared::{
    protocol::{ProtocolMessage, decode_message},
    time::FixedClock,
};
use tokio::sync::mpsc;

use crate::{
    domain::{
        ChatStore, Connection, ConnectionId, CredentialVerifier, DisplayName, Identity,
        MessagePusher, Participant, RoomId, RoomRepository, Timestamp,
    },
    infrastructure::{
        chat_store::InMemoryChatStore, message_pusher::WebSocketMessagePusher,
        repository::InMemoryRoomRepository,
    },
};

use super::{
    ConnectParticipantUseCase, DisconnectParticipantUseCase, JoinRoomUseCase, LeaveRoomUseCase,
    RouteMessageUseCase, SendMessageUseCase, room_lock::RoomLocks,
};

pub struct Harness {
    pub repository: Arc<InMemoryRoomRepository>,
    pub pusher: Arc<WebSocketMessagePusher>,
    pub room_locks: Arc<RoomLocks>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub const NOW: i64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self {
            repository: Arc::new(InMemoryRoomRepository::new()),
            pusher: Arc::new(WebSocketMessagePusher::default()),
            room_locks: Arc::new(RoomLocks::new()),
            clock: Arc::new(FixedClock::new(Self::NOW)),
        }
    }

    /// 接続テーブルと MessagePusher に直接登録する
    pub async fn connect(&self, name: &str) -> (Participant, mpsc::Receiver<String>) {
        let connection = Connection::new(
            Identity::new(name.to_string()).unwrap(),
            DisplayName::new(name),
            ConnectionId::generate(),
            Timestamp::new(Self::NOW),
        );
        let participant = Participant::new(connection.key(), connection.display_name.clone());
        self.repository.register_connection(connection).await;
        let (tx, rx) = mpsc::channel(64);
        self.pusher.register_client(participant.key.clone(), tx).await;
        (participant, rx)
    }

    pub fn join_room(&self) -> JoinRoomUseCase {
        JoinRoomUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            self.room_locks.clone(),
            self.clock.clone(),
        )
    }

    pub fn leave_room(&self) -> LeaveRoomUseCase {
        LeaveRoomUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            self.room_locks.clone(),
        )
    }

    pub fn send_message(&self, chat_store: Arc<dyn ChatStore>) -> SendMessageUseCase {
        SendMessageUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            chat_store,
            self.clock.clone(),
            1000,
        )
    }

    pub fn connect_participant(
        &self,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> ConnectParticipantUseCase {
        ConnectParticipantUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            verifier,
            Arc::new(self.leave_room()),
            self.clock.clone(),
        )
    }

    pub fn disconnect_participant(&self) -> DisconnectParticipantUseCase {
        DisconnectParticipantUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            Arc::new(self.leave_room()),
        )
    }

    pub fn route_message(&self) -> RouteMessageUseCase {
        RouteMessageUseCase::new(
            self.repository.clone(),
            self.pusher.clone(),
            Arc::new(self.join_room()),
            Arc::new(self.leave_room()),
            Arc::new(self.send_message(Arc::new(InMemoryChatStore::default()))),
            self.room_locks.clone(),
            self.clock.clone(),
        )
    }
}

pub fn room_id(value: &str) -> RoomId {
    RoomId::new(value.to_string()).unwrap()
}

/// 受信済みのメッセージをすべて取り出してデコードする
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<ProtocolMessage> {
    let mut messages = Vec::new();
    while let Ok(text) = rx.try_recv() {
        messages.push(decode_message(&text).unwrap());
    }
    messages
}
