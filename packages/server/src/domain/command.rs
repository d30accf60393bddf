//! クライアントから届くルーム操作コマンド
//!
//! ワイヤーメッセージ（DTO）から変換された後の、検証済みの操作を表す。

use tegaki_shared::canvas::{CanvasData, Point, ShapeOp};

use super::RoomId;

#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    Join(RoomId),
    Leave(RoomId),
    /// 本文はサニタイズ前
    Chat {
        room_id: RoomId,
        text: String,
    },
    Shape {
        room_id: RoomId,
        op: ShapeOp,
    },
    ReplaceCanvas {
        room_id: RoomId,
        data: CanvasData,
    },
    Cursor {
        room_id: RoomId,
        position: Point,
    },
    Ping {
        timestamp: Option<i64>,
    },
}
