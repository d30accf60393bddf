//! Conversion logic between DTOs and domain entities.

use tegaki_shared::{canvas::ShapeOp, protocol::ProtocolMessage};
use thiserror::Error;

use crate::{
    domain::{
        ChatMessage, ChatText, DisplayName, Identity, Room, RoomCommand, RoomId, Timestamp,
        ValueObjectError,
    },
    infrastructure::dto::{
        http::{ChatHistoryItemDto, MemberDto, RoomDetailDto, RoomSnapshotDto, RoomSummaryDto},
        record::ChatRecord,
    },
};
use tegaki_shared::time::timestamp_to_rfc3339;

/// Inbound message that cannot become a room command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Server-to-client kinds sent by a client
    #[error("'{0}' is not accepted from clients")]
    NotClientBound(&'static str),

    #[error(transparent)]
    InvalidValue(#[from] ValueObjectError),
}

// ========================================
// DTO → Domain
// ========================================

impl TryFrom<ProtocolMessage> for RoomCommand {
    type Error = ConversionError;

    fn try_from(message: ProtocolMessage) -> Result<Self, Self::Error> {
        let command = match message {
            ProtocolMessage::JoinRoom { room_id } => RoomCommand::Join(RoomId::new(room_id)?),
            ProtocolMessage::LeaveRoom { room_id } => RoomCommand::Leave(RoomId::new(room_id)?),
            ProtocolMessage::Chat { room_id, text, .. } => RoomCommand::Chat {
                room_id: RoomId::new(room_id)?,
                text,
            },
            ProtocolMessage::ShapeAdded { room_id, data, .. } => RoomCommand::Shape {
                room_id: RoomId::new(room_id)?,
                op: ShapeOp::Add(data),
            },
            ProtocolMessage::ShapeUpdated { room_id, data, .. } => RoomCommand::Shape {
                room_id: RoomId::new(room_id)?,
                op: ShapeOp::Update(data),
            },
            ProtocolMessage::ShapeRemoved { room_id, data, .. } => RoomCommand::Shape {
                room_id: RoomId::new(room_id)?,
                op: ShapeOp::Remove(data.id),
            },
            ProtocolMessage::StateSync { room_id, data, .. } => RoomCommand::ReplaceCanvas {
                room_id: RoomId::new(room_id)?,
                data,
            },
            ProtocolMessage::CursorMove { room_id, data, .. } => RoomCommand::Cursor {
                room_id: RoomId::new(room_id)?,
                position: data,
            },
            ProtocolMessage::Ping { timestamp, .. } => RoomCommand::Ping { timestamp },
            other @ (ProtocolMessage::RoomState { .. }
            | ProtocolMessage::MemberJoined { .. }
            | ProtocolMessage::MemberLeft { .. }
            | ProtocolMessage::Pong { .. }) => {
                return Err(ConversionError::NotClientBound(other.kind()));
            }
        };
        Ok(command)
    }
}

impl TryFrom<ChatRecord> for ChatMessage {
    type Error = ValueObjectError;

    fn try_from(record: ChatRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            room_id: RoomId::new(record.room_id)?,
            author: Identity::new(record.user_id)?,
            display_name: DisplayName::new(record.display_name),
            text: ChatText::from_stored(record.text),
            timestamp: Timestamp::new(record.timestamp),
        })
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<ChatMessage> for ChatRecord {
    fn from(message: ChatMessage) -> Self {
        Self {
            room_id: message.room_id.into_string(),
            user_id: message.author.into_string(),
            display_name: message.display_name.into_string(),
            text: message.text.into_string(),
            timestamp: message.timestamp.value(),
        }
    }
}

impl From<ChatMessage> for ChatHistoryItemDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            user_id: message.author.into_string(),
            display_name: message.display_name.into_string(),
            text: message.text.into_string(),
            timestamp: message.timestamp.value(),
            sent_at: timestamp_to_rfc3339(message.timestamp.value()),
        }
    }
}

fn members_of(room: &Room) -> Vec<MemberDto> {
    room.members
        .iter()
        .map(|(identity, display_name)| MemberDto {
            user_id: identity.as_str().to_string(),
            display_name: display_name.as_str().to_string(),
        })
        .collect()
}

impl From<&Room> for RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            member_count: room.member_count(),
            shape_count: room.shapes.len(),
            created_at: timestamp_to_rfc3339(room.created_at.value()),
        }
    }
}

impl From<&Room> for RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            members: members_of(room),
            shape_count: room.shapes.len(),
            viewport: room.viewport,
            created_at: timestamp_to_rfc3339(room.created_at.value()),
            last_modified: timestamp_to_rfc3339(room.last_modified.value()),
        }
    }
}

impl From<&Room> for RoomSnapshotDto {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id.as_str().to_string(),
            members: members_of(room),
            shapes: room.shapes.to_vec(),
            viewport: room.viewport,
            last_modified: room.last_modified.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tegaki_shared::canvas::{ShapeRef, Viewport};

    #[test]
    fn test_shape_removed_becomes_remove_op() {
        // テスト項目: shape_removed が識別子指定の削除コマンドに変換される
        // given (前提条件):
        let message = ProtocolMessage::ShapeRemoved {
            room_id: "demo".to_string(),
            user_id: Some("spoofed".to_string()),
            data: ShapeRef {
                id: "s1".to_string(),
            },
        };

        // when (操作):
        let command = RoomCommand::try_from(message).unwrap();

        // then (期待する結果):
        assert_eq!(
            command,
            RoomCommand::Shape {
                room_id: RoomId::new("demo".to_string()).unwrap(),
                op: ShapeOp::Remove("s1".to_string()),
            }
        );
    }

    #[test]
    fn test_server_bound_kinds_are_rejected() {
        // テスト項目: サーバーからのみ送られる種別はコマンドに変換されない
        // given (前提条件):
        let message = ProtocolMessage::RoomState {
            room_id: "demo".to_string(),
            shapes: vec![],
            viewport: Viewport::default(),
            members: vec![],
        };

        // when (操作):
        let result = RoomCommand::try_from(message);

        // then (期待する結果):
        assert_eq!(result, Err(ConversionError::NotClientBound("room_state")));
    }

    #[test]
    fn test_chat_record_round_trip_keeps_fields() {
        // テスト項目: ChatRecord からドメインの ChatMessage に変換できる
        // given (前提条件):
        let record = ChatRecord {
            room_id: "demo".to_string(),
            user_id: "alice".to_string(),
            display_name: "Alice".to_string(),
            text: "hello".to_string(),
            timestamp: 1000,
        };

        // when (操作):
        let message = ChatMessage::try_from(record.clone()).unwrap();

        // then (期待する結果):
        assert_eq!(message.author.as_str(), "alice");
        assert_eq!(message.text.as_str(), "hello");
        assert_eq!(ChatRecord::from(message), record);
    }
}
