//! JSON wire protocol spoken over the relay WebSocket.
//!
//! Every frame is a JSON object tagged by `"type"`, carrying a room id, an
//! optional sender identity (always stamped by the relay on the way out),
//! and a kind-specific payload. Unknown `type` values decode to
//! [`DecodeError::UnknownKind`] so callers can ignore them without treating
//! them as malformed.

use serde::{Deserialize, Serialize};

use crate::{
    canvas::{CanvasData, Point, Shape, ShapeRef, Viewport, validate_shape_id},
    error::{DecodeError, ValidationError},
};

/// Longest accepted room identifier, in characters.
pub const MAX_ROOM_ID_LEN: usize = 64;

/// Close code sent to a connection superseded by a newer one with the same
/// identity. Clients receiving it must not reconnect.
pub const REPLACED_CLOSE_CODE: u16 = 4001;

/// Every `type` tag this build understands.
pub const KNOWN_KINDS: [&str; 13] = [
    "join_room",
    "leave_room",
    "room_state",
    "member_joined",
    "member_left",
    "chat",
    "shape_added",
    "shape_removed",
    "shape_updated",
    "state_sync",
    "cursor_move",
    "ping",
    "pong",
];

/// Roster entry sent with `room_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub user_id: String,
    pub display_name: String,
}

/// A protocol message in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ProtocolMessage {
    JoinRoom {
        room_id: String,
    },
    LeaveRoom {
        room_id: String,
    },
    RoomState {
        room_id: String,
        shapes: Vec<Shape>,
        viewport: Viewport,
        members: Vec<MemberInfo>,
    },
    MemberJoined {
        room_id: String,
        user_id: String,
        display_name: String,
        member_count: usize,
    },
    MemberLeft {
        room_id: String,
        user_id: String,
        display_name: String,
        member_count: usize,
    },
    Chat {
        room_id: String,
        #[serde(alias = "message")]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    ShapeAdded {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: Shape,
    },
    ShapeRemoved {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: ShapeRef,
    },
    ShapeUpdated {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: Shape,
    },
    StateSync {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        data: CanvasData,
    },
    CursorMove {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        data: Point,
    },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl ProtocolMessage {
    /// The wire `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::JoinRoom { .. } => "join_room",
            ProtocolMessage::LeaveRoom { .. } => "leave_room",
            ProtocolMessage::RoomState { .. } => "room_state",
            ProtocolMessage::MemberJoined { .. } => "member_joined",
            ProtocolMessage::MemberLeft { .. } => "member_left",
            ProtocolMessage::Chat { .. } => "chat",
            ProtocolMessage::ShapeAdded { .. } => "shape_added",
            ProtocolMessage::ShapeRemoved { .. } => "shape_removed",
            ProtocolMessage::ShapeUpdated { .. } => "shape_updated",
            ProtocolMessage::StateSync { .. } => "state_sync",
            ProtocolMessage::CursorMove { .. } => "cursor_move",
            ProtocolMessage::Ping { .. } => "ping",
            ProtocolMessage::Pong { .. } => "pong",
        }
    }

    /// Room this message is addressed to, if any.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            ProtocolMessage::JoinRoom { room_id }
            | ProtocolMessage::LeaveRoom { room_id }
            | ProtocolMessage::RoomState { room_id, .. }
            | ProtocolMessage::MemberJoined { room_id, .. }
            | ProtocolMessage::MemberLeft { room_id, .. }
            | ProtocolMessage::Chat { room_id, .. }
            | ProtocolMessage::ShapeAdded { room_id, .. }
            | ProtocolMessage::ShapeRemoved { room_id, .. }
            | ProtocolMessage::ShapeUpdated { room_id, .. }
            | ProtocolMessage::StateSync { room_id, .. }
            | ProtocolMessage::CursorMove { room_id, .. } => Some(room_id),
            ProtocolMessage::Ping { room_id, .. } => room_id.as_deref(),
            ProtocolMessage::Pong { .. } => None,
        }
    }

    /// Sender identity stamped on the message, if any.
    pub fn sender(&self) -> Option<&str> {
        match self {
            ProtocolMessage::MemberJoined { user_id, .. }
            | ProtocolMessage::MemberLeft { user_id, .. } => Some(user_id),
            ProtocolMessage::Chat { user_id, .. }
            | ProtocolMessage::ShapeAdded { user_id, .. }
            | ProtocolMessage::ShapeRemoved { user_id, .. }
            | ProtocolMessage::ShapeUpdated { user_id, .. }
            | ProtocolMessage::StateSync { user_id, .. }
            | ProtocolMessage::CursorMove { user_id, .. } => user_id.as_deref(),
            _ => None,
        }
    }

    /// Structural validation beyond what the JSON shape enforces.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(room_id) = self.room_id() {
            validate_room_id(room_id)?;
        }
        match self {
            ProtocolMessage::RoomState {
                shapes, viewport, ..
            } => {
                viewport.validate()?;
                shapes.iter().try_for_each(Shape::validate)
            }
            ProtocolMessage::ShapeAdded { data, .. } | ProtocolMessage::ShapeUpdated { data, .. } => {
                data.validate()
            }
            ProtocolMessage::ShapeRemoved { data, .. } => validate_shape_id(&data.id),
            ProtocolMessage::StateSync { data, .. } => data.validate(),
            ProtocolMessage::CursorMove { data, .. } if !data.is_finite() => {
                Err(ValidationError::NonFiniteCoordinate)
            }
            _ => Ok(()),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn validate_room_id(room_id: &str) -> Result<(), ValidationError> {
    if room_id.trim().is_empty() {
        return Err(ValidationError::EmptyRoomId);
    }
    if room_id.chars().count() > MAX_ROOM_ID_LEN {
        return Err(ValidationError::RoomIdTooLong {
            max: MAX_ROOM_ID_LEN,
        });
    }
    Ok(())
}

/// Decode and validate one inbound text frame.
pub fn decode_message(text: &str) -> Result<ProtocolMessage, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingKind)?;
    if !KNOWN_KINDS.contains(&kind) {
        return Err(DecodeError::UnknownKind(kind.to_string()));
    }
    let message: ProtocolMessage = serde_json::from_value(value)?;
    message.validate()?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{FillColor, ShapeKind};

    #[test]
    fn test_decode_join_room() {
        // テスト項目: join_room が camelCase の roomId 付きでデコードされる
        // given (前提条件):
        let text = r#"{"type":"join_room","roomId":"demo"}"#;

        // when (操作):
        let message = decode_message(text).unwrap();

        // then (期待する結果):
        assert_eq!(
            message,
            ProtocolMessage::JoinRoom {
                room_id: "demo".to_string()
            }
        );
    }

    #[test]
    fn test_decode_unknown_kind_is_distinguished() {
        // テスト項目: 未知の type は UnknownKind として区別される
        // given (前提条件):
        let text = r#"{"type":"laser_pointer","roomId":"demo"}"#;

        // when (操作):
        let result = decode_message(text);

        // then (期待する結果):
        assert!(matches!(result, Err(DecodeError::UnknownKind(kind)) if kind == "laser_pointer"));
    }

    #[test]
    fn test_decode_malformed_json() {
        // テスト項目: JSON として壊れているフレームは Malformed になる
        // given (前提条件):
        let text = r#"{"type":"chat","roomId":"#;

        // when (操作):
        let result = decode_message(text);

        // then (期待する結果):
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_missing_payload_is_malformed() {
        // テスト項目: 既知の type でも必須フィールドが欠けていれば Malformed になる
        // given (前提条件):
        let text = r#"{"type":"shape_added","roomId":"demo","data":{"id":"s1"}}"#;

        // when (操作):
        let result = decode_message(text);

        // then (期待する結果):
        assert!(matches!(result, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_decode_missing_type() {
        // テスト項目: type を持たないオブジェクトは MissingKind になる
        // given (前提条件):
        let text = r#"{"roomId":"demo"}"#;

        // when (操作):
        let result = decode_message(text);

        // then (期待する結果):
        assert!(matches!(result, Err(DecodeError::MissingKind)));
    }

    #[test]
    fn test_decode_rejects_empty_room_id() {
        // テスト項目: 空のルーム ID は検証エラーになる
        // given (前提条件):
        let text = r#"{"type":"leave_room","roomId":"  "}"#;

        // when (操作):
        let result = decode_message(text);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(DecodeError::Invalid(ValidationError::EmptyRoomId))
        ));
    }

    #[test]
    fn test_chat_accepts_message_alias() {
        // テスト項目: chat のテキストは message フィールドでも受け付ける
        // given (前提条件):
        let text = r#"{"type":"chat","roomId":"7","message":"hi"}"#;

        // when (操作):
        let message = decode_message(text).unwrap();

        // then (期待する結果):
        match message {
            ProtocolMessage::Chat { text, user_id, .. } => {
                assert_eq!(text, "hi");
                assert_eq!(user_id, None);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_encode_shape_added() {
        // テスト項目: shape_added が type タグ・camelCase・data ペイロードで出力される
        // given (前提条件):
        let message = ProtocolMessage::ShapeAdded {
            room_id: "demo".to_string(),
            user_id: Some("alice".to_string()),
            data: Shape {
                id: "alice-1".to_string(),
                kind: ShapeKind::Rectangle,
                color: FillColor::Red,
                start_point: Point::new(10.0, 10.0),
                end_point: Point::new(50.0, 40.0),
                user_id: "alice".to_string(),
                timestamp: 1,
            },
        };

        // when (操作):
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "shape_added");
        assert_eq!(value["roomId"], "demo");
        assert_eq!(value["userId"], "alice");
        assert_eq!(value["data"]["type"], "rectangle");
        assert_eq!(value["data"]["endPoint"]["y"], 40.0);
    }

    #[test]
    fn test_encode_omits_absent_sender() {
        // テスト項目: 送信者未設定の cursor_move は userId を出力しない
        // given (前提条件):
        let message = ProtocolMessage::CursorMove {
            room_id: "demo".to_string(),
            user_id: None,
            display_name: None,
            data: Point::new(1.0, 2.0),
        };

        // when (操作):
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        // then (期待する結果):
        assert!(value.get("userId").is_none());
        assert_eq!(message.sender(), None);
        assert_eq!(message.kind(), "cursor_move");
    }

    #[test]
    fn test_member_joined_wire_format() {
        // テスト項目: member_joined が memberCount / displayName を含む
        // given (前提条件):
        let message = ProtocolMessage::MemberJoined {
            room_id: "demo".to_string(),
            user_id: "bob".to_string(),
            display_name: "Bob".to_string(),
            member_count: 2,
        };

        // when (操作):
        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(value["memberCount"], 2);
        assert_eq!(value["displayName"], "Bob");
        assert_eq!(message.sender(), Some("bob"));
    }
}
