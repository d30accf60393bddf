//! Message formatting utilities for client display.

use std::collections::BTreeMap;

use chrono::DateTime;
use tegaki_shared::{
    canvas::{Shape, ShapeCollection},
    protocol::MemberInfo,
    time::timestamp_to_rfc3339,
};

use crate::domain::Frame;

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format the snapshot received after joining a room
    ///
    /// # Arguments
    ///
    /// * `room_id` - The joined room
    /// * `members` - Current members of the room
    /// * `shape_count` - Number of shapes in the snapshot
    /// * `current_user_id` - The local identity (to mark as "me")
    ///
    /// # Returns
    ///
    /// A formatted string with the member list and canvas size
    pub fn format_snapshot(
        room_id: &str,
        members: &[MemberInfo],
        shape_count: usize,
        current_user_id: &str,
    ) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", RULE));
        output.push_str(&format!("Room '{}' ({} shapes)\n", room_id, shape_count));
        output.push_str("Members:\n");

        if members.is_empty() {
            output.push_str("(No members)\n");
        } else {
            for member in members {
                let me_suffix = if member.user_id == current_user_id {
                    " (me)"
                } else {
                    ""
                };
                output.push_str(&format!("{}{}\n", member.display_name, me_suffix));
            }
        }

        output.push_str(RULE);
        output.push('\n');
        output
    }

    pub fn format_member_joined(display_name: &str, member_count: usize) -> String {
        format!("\n+ {} joined ({} in room)\n", display_name, member_count)
    }

    pub fn format_member_left(display_name: &str, member_count: usize) -> String {
        format!("\n- {} left ({} in room)\n", display_name, member_count)
    }

    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `from` - Display name of the sender
    /// * `text` - The sanitized message text
    /// * `sent_at` - Unix timestamp stamped by the relay (milliseconds)
    ///
    /// # Returns
    ///
    /// A formatted string with the chat message
    pub fn format_chat_message(from: &str, text: &str, sent_at: i64) -> String {
        format!(
            "\n[{}] @{}: {}\n",
            Self::format_clock(sent_at),
            from,
            text
        )
    }

    /// `HH:MM:SS` in UTC
    pub fn format_clock(timestamp_millis: i64) -> String {
        DateTime::from_timestamp_millis(timestamp_millis)
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string())
    }

    /// Format a coalesced repaint as a one-line status
    pub fn format_frame(frame: &Frame) -> String {
        let selected = frame.selected.as_deref().unwrap_or("-");
        let mut line = format!(
            "\n[canvas r{}] {} shapes, {} cursors, view ({:.1}, {:.1}) x{:.2}, selected {}",
            frame.revision,
            frame.shape_count,
            frame.cursor_count,
            frame.viewport.x,
            frame.viewport.y,
            frame.viewport.zoom,
            selected
        );
        if let Some(preview) = &frame.preview {
            line.push_str(&format!(", drawing {}", Self::describe_shape(preview)));
        }
        line.push('\n');
        line
    }

    /// Format every shape, bottom to top
    pub fn format_shapes(shapes: &ShapeCollection) -> String {
        if shapes.is_empty() {
            return "\n(No shapes)\n".to_string();
        }
        let mut output = String::from("\n");
        for shape in shapes.iter() {
            output.push_str(&format!(
                "{} {} by {} at {}\n",
                shape.id,
                Self::describe_shape(shape),
                shape.user_id,
                timestamp_to_rfc3339(shape.timestamp)
            ));
        }
        output
    }

    pub fn format_members(members: &BTreeMap<String, String>, current_user_id: &str) -> String {
        let mut output = String::from("\nMembers:\n");
        for (user_id, display_name) in members {
            let me_suffix = if user_id == current_user_id { " (me)" } else { "" };
            output.push_str(&format!("{} [{}]{}\n", display_name, user_id, me_suffix));
        }
        output
    }

    pub fn format_pong(round_trip_ms: Option<i64>) -> String {
        match round_trip_ms {
            Some(ms) => format!("\npong ({} ms)\n", ms),
            None => "\npong\n".to_string(),
        }
    }

    pub fn format_help() -> String {
        [
            "",
            "Commands:",
            "  /draw x1 y1 x2 y2     draw with the current shape and color",
            "  /select x y           select the topmost shape under a point",
            "  /delete               delete the selected shape",
            "  /pan dx dy            move the view",
            "  /zoom in|out [x y]    zoom around a screen point",
            "  /move x y             move your cursor",
            "  /tool select|pan|draw",
            "  /shape rectangle|ellipse|line",
            "  /color red|blue|green|yellow|none",
            "  /clear                remove every shape for everyone",
            "  /list                 list shapes",
            "  /who                  list members",
            "  /ping",
            "  /quit",
            "Anything else is sent as chat.",
            "",
        ]
        .join("\n")
    }

    fn describe_shape(shape: &Shape) -> String {
        format!(
            "{} {} ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            shape.kind,
            shape.color,
            shape.start_point.x,
            shape.start_point.y,
            shape.end_point.x,
            shape.end_point.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tegaki_shared::canvas::{FillColor, Point, ShapeKind, Viewport};

    #[test]
    fn test_format_snapshot_marks_me() {
        // テスト項目: スナップショット表示で自分に "(me)" が付く
        // given (前提条件):
        let members = vec![
            MemberInfo {
                user_id: "u-1".to_string(),
                display_name: "Alice".to_string(),
            },
            MemberInfo {
                user_id: "u-2".to_string(),
                display_name: "Bob".to_string(),
            },
        ];

        // when (操作):
        let result = MessageFormatter::format_snapshot("demo", &members, 3, "u-1");

        // then (期待する結果):
        assert!(result.contains("Room 'demo' (3 shapes)"));
        assert!(result.contains("Alice (me)"));
        assert!(result.contains("Bob\n"));
    }

    #[test]
    fn test_format_snapshot_with_no_members() {
        // テスト項目: メンバーが空の場合、適切なメッセージが表示される
        // given (前提条件):
        let members = vec![];

        // when (操作):
        let result = MessageFormatter::format_snapshot("demo", &members, 0, "u-1");

        // then (期待する結果):
        assert!(result.contains("(No members)"));
        assert!(result.contains(RULE));
    }

    #[test]
    fn test_format_chat_message() {
        // テスト項目: チャットは時刻・送信者・本文を含む
        // given (前提条件):
        let sent_at = 1_672_498_800_000; // 2022-12-31T15:00:00Z

        // when (操作):
        let result = MessageFormatter::format_chat_message("Alice", "hello", sent_at);

        // then (期待する結果):
        assert_eq!(result, "\n[15:00:00] @Alice: hello\n");
    }

    #[test]
    fn test_format_frame_and_shapes() {
        // テスト項目: 描画ステータスと図形一覧に必要な情報が含まれる
        // given (前提条件):
        let shape = Shape {
            id: "s1".to_string(),
            kind: ShapeKind::Rectangle,
            color: FillColor::Red,
            start_point: Point::new(10.0, 10.0),
            end_point: Point::new(50.0, 40.0),
            user_id: "u-1".to_string(),
            timestamp: 0,
        };
        let frame = Frame {
            revision: 4,
            shape_count: 1,
            viewport: Viewport::default(),
            cursor_count: 2,
            selected: Some("s1".to_string()),
            preview: None,
        };

        // when (操作):
        let status = MessageFormatter::format_frame(&frame);
        let listing = MessageFormatter::format_shapes(&ShapeCollection::from_shapes([shape]));

        // then (期待する結果):
        assert!(status.contains("[canvas r4] 1 shapes, 2 cursors"));
        assert!(status.contains("selected s1"));
        assert!(listing.contains("s1 rectangle red (10.0, 10.0) -> (50.0, 40.0) by u-1"));
    }
}
