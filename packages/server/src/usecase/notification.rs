//! ドメインの出来事からクライアント向けのプロトコルメッセージを組み立てる
//!
//! 送信者の `userId` / `displayName` は常に認証済みの接続から付与する
//! （クライアントが送ってきた値は使わない）。

use tegaki_shared::{
    canvas::{CanvasData, Point, ShapeOp, ShapeRef},
    protocol::{MemberInfo, ProtocolMessage},
};

use crate::domain::{ChatMessage, Departure, Participant, Room, RoomId};

/// join した本人に送るスナップショット
pub fn room_state(room: &Room) -> ProtocolMessage {
    ProtocolMessage::RoomState {
        room_id: room.id.as_str().to_string(),
        shapes: room.shapes.to_vec(),
        viewport: room.viewport,
        members: room
            .members
            .iter()
            .map(|(identity, display_name)| MemberInfo {
                user_id: identity.as_str().to_string(),
                display_name: display_name.as_str().to_string(),
            })
            .collect(),
    }
}

pub fn member_joined(room_id: &RoomId, who: &Participant, member_count: usize) -> ProtocolMessage {
    ProtocolMessage::MemberJoined {
        room_id: room_id.as_str().to_string(),
        user_id: who.identity().as_str().to_string(),
        display_name: who.display_name.as_str().to_string(),
        member_count,
    }
}

pub fn member_left(departure: &Departure) -> ProtocolMessage {
    ProtocolMessage::MemberLeft {
        room_id: departure.room_id.as_str().to_string(),
        user_id: departure.identity.as_str().to_string(),
        display_name: departure.display_name.as_str().to_string(),
        member_count: departure.member_count,
    }
}

pub fn chat(message: &ChatMessage) -> ProtocolMessage {
    ProtocolMessage::Chat {
        room_id: message.room_id.as_str().to_string(),
        text: message.text.as_str().to_string(),
        user_id: Some(message.author.as_str().to_string()),
        display_name: Some(message.display_name.as_str().to_string()),
        timestamp: Some(message.timestamp.value()),
    }
}

pub fn shape(room_id: &RoomId, sender: &Participant, op: ShapeOp) -> ProtocolMessage {
    let room_id = room_id.as_str().to_string();
    let user_id = Some(sender.identity().as_str().to_string());
    match op {
        ShapeOp::Add(data) => ProtocolMessage::ShapeAdded {
            room_id,
            user_id,
            data,
        },
        ShapeOp::Update(data) => ProtocolMessage::ShapeUpdated {
            room_id,
            user_id,
            data,
        },
        ShapeOp::Remove(id) => ProtocolMessage::ShapeRemoved {
            room_id,
            user_id,
            data: ShapeRef { id },
        },
    }
}

pub fn state_sync(room_id: &RoomId, sender: &Participant, data: CanvasData) -> ProtocolMessage {
    ProtocolMessage::StateSync {
        room_id: room_id.as_str().to_string(),
        user_id: Some(sender.identity().as_str().to_string()),
        data,
    }
}

pub fn cursor(room_id: &RoomId, sender: &Participant, position: Point) -> ProtocolMessage {
    ProtocolMessage::CursorMove {
        room_id: room_id.as_str().to_string(),
        user_id: Some(sender.identity().as_str().to_string()),
        display_name: Some(sender.display_name.as_str().to_string()),
        data: position,
    }
}

pub fn pong(timestamp: i64) -> ProtocolMessage {
    ProtocolMessage::Pong {
        timestamp: Some(timestamp),
    }
}
