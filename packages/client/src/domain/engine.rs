//! Client Sync Engine
//!
//! ローカルの図形コレクション・ビューポート・ツール状態を保持する同期的な状態機械。
//! ソケットやタイマーには触れず、呼び出し側が時刻（Unix ミリ秒）を渡す。
//!
//! - ポインター操作: `Idle → Drawing / Panning / Selecting → Idle`
//! - 自分の操作は楽観的に即時反映し、送信メッセージを outbox に積む
//! - リモートのメッセージは ID をキーに insert-or-replace / remove で反映する
//!   （送信者が自分のものは無視する）
//! - 再描画は `tick()` 1 回に集約される
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ポインター状態遷移と、確定した図形の送信
//! - リモートメッセージの反映（Last-Write-Wins、送信者フィルタ、ルームフィルタ）
//! - カーソル送信の間引きとリモートカーソルの期限切れ
//! - 再描画の集約と destroy 後の停止
//!
//! ### どのような状況を想定しているか
//! - 正常系：描画・選択・削除・パン・ズーム
//! - エッジケース：クリック程度の短いドラッグ、オフライン中の編集が join のスナップショットで上書きされる

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt,
    str::FromStr,
};

use tegaki_shared::{
    canvas::{CanvasData, FillColor, Point, Shape, ShapeCollection, ShapeKind, ShapeRef, Viewport},
    protocol::{MemberInfo, ProtocolMessage},
};

use super::geometry::topmost_at;

/// これ以下のドラッグ距離（ルーム座標）の描画は誤クリックとして破棄する
pub const MIN_DRAG_DISTANCE: f64 = 5.0;
/// 線分の当たり判定の許容距離（スクリーン座標）
pub const HIT_TOLERANCE_PX: f64 = 5.0;
pub const ZOOM_IN_FACTOR: f64 = 1.1;
pub const ZOOM_OUT_FACTOR: f64 = 0.9;
pub const DEFAULT_CURSOR_THROTTLE_MS: i64 = 50;
pub const DEFAULT_CURSOR_TTL_MS: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Draw,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::Select => "select",
            Tool::Pan => "pan",
            Tool::Draw => "draw",
        })
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "select" => Ok(Tool::Select),
            "pan" => Ok(Tool::Pan),
            "draw" => Ok(Tool::Draw),
            other => Err(format!("unknown tool '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
}

/// ポインター操作の状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerState {
    Idle,
    /// 描画中（座標はルーム座標）
    Drawing { anchor: Point, current: Point },
    /// パン中（座標はスクリーン座標）
    Panning { last: Point },
    Selecting,
}

/// 他のメンバーのカーソル
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub display_name: String,
    pub position: Point,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub identity: String,
    pub display_name: String,
    pub room_id: String,
    pub cursor_throttle_ms: i64,
    pub cursor_ttl_ms: i64,
}

impl EngineConfig {
    pub fn new(
        identity: impl Into<String>,
        display_name: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            display_name: display_name.into(),
            room_id: room_id.into(),
            cursor_throttle_ms: DEFAULT_CURSOR_THROTTLE_MS,
            cursor_ttl_ms: DEFAULT_CURSOR_TTL_MS,
        }
    }
}

/// 表示側に伝えるイベント
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Snapshot {
        shape_count: usize,
        members: Vec<MemberInfo>,
    },
    MemberJoined {
        user_id: String,
        display_name: String,
        member_count: usize,
    },
    MemberLeft {
        user_id: String,
        display_name: String,
        member_count: usize,
    },
    Chat {
        user_id: String,
        display_name: String,
        text: String,
        timestamp: i64,
    },
    Pong {
        timestamp: Option<i64>,
    },
}

/// 1 回分の描画内容
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 図形コレクションの変更回数
    pub revision: u64,
    pub shape_count: usize,
    pub viewport: Viewport,
    pub cursor_count: usize,
    pub selected: Option<String>,
    pub preview: Option<Shape>,
}

/// 再描画要求を次の tick にまとめる
#[derive(Debug, Default)]
struct RenderScheduler {
    dirty: bool,
    stopped: bool,
    frames: u64,
}

impl RenderScheduler {
    fn request(&mut self) {
        if !self.stopped {
            self.dirty = true;
        }
    }

    fn take_frame(&mut self) -> bool {
        if self.stopped || !self.dirty {
            return false;
        }
        self.dirty = false;
        self.frames += 1;
        true
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.dirty = false;
    }
}

pub struct SyncEngine {
    config: EngineConfig,
    shapes: ShapeCollection,
    viewport: Viewport,
    tool: Tool,
    draw_kind: ShapeKind,
    draw_color: FillColor,
    selected: Option<String>,
    pointer: PointerState,
    /// メンバーと表示名
    members: BTreeMap<String, String>,
    cursors: HashMap<String, RemoteCursor>,
    last_cursor_sent: Option<i64>,
    render: RenderScheduler,
    outbox: VecDeque<ProtocolMessage>,
    revision: u64,
    shape_seq: u64,
    destroyed: bool,
}

impl SyncEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            shapes: ShapeCollection::new(),
            viewport: Viewport::default(),
            tool: Tool::default(),
            draw_kind: ShapeKind::default(),
            draw_color: FillColor::default(),
            selected: None,
            pointer: PointerState::Idle,
            members: BTreeMap::new(),
            cursors: HashMap::new(),
            last_cursor_sent: None,
            render: RenderScheduler::default(),
            outbox: VecDeque::new(),
            revision: 0,
            shape_seq: 0,
            destroyed: false,
        }
    }

    pub fn identity(&self) -> &str {
        &self.config.identity
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    pub fn room_id(&self) -> &str {
        &self.config.room_id
    }

    pub fn shapes(&self) -> &ShapeCollection {
        &self.shapes
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn draw_style(&self) -> (ShapeKind, FillColor) {
        (self.draw_kind, self.draw_color)
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn members(&self) -> &BTreeMap<String, String> {
        &self.members
    }

    pub fn cursors(&self) -> &HashMap<String, RemoteCursor> {
        &self.cursors
    }

    pub fn frames_rendered(&self) -> u64 {
        self.render.frames
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ========================================
    // ローカル操作
    // ========================================

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.pointer = PointerState::Idle;
        self.render.request();
    }

    pub fn set_shape_kind(&mut self, kind: ShapeKind) {
        self.draw_kind = kind;
    }

    pub fn set_color(&mut self, color: FillColor) {
        self.draw_color = color;
    }

    /// ルームへの参加を要求する（再接続時にも呼ぶ）
    pub fn join(&mut self) {
        if self.destroyed {
            return;
        }
        self.push(ProtocolMessage::JoinRoom {
            room_id: self.config.room_id.clone(),
        });
    }

    /// 新しいセッションで再参加する
    ///
    /// 前のセッションで送れなかったメッセージは破棄し、join_room だけを積む。
    /// 参加後に届くスナップショットがローカルの状態を置き換える。
    ///
    /// # Returns
    ///
    /// 破棄したメッセージ数
    pub fn rejoin(&mut self) -> usize {
        if self.destroyed {
            return 0;
        }
        let discarded = self.outbox.len();
        self.outbox.clear();
        self.join();
        discarded
    }

    pub fn leave(&mut self) {
        if self.destroyed {
            return;
        }
        self.push(ProtocolMessage::LeaveRoom {
            room_id: self.config.room_id.clone(),
        });
        self.members.clear();
        self.cursors.clear();
        self.render.request();
    }

    pub fn pointer_down(&mut self, screen: Point, button: PointerButton) {
        if self.destroyed {
            return;
        }
        if button == PointerButton::Middle || self.tool == Tool::Pan {
            self.pointer = PointerState::Panning { last: screen };
            return;
        }

        let world = self.viewport.screen_to_world(screen);
        match self.tool {
            Tool::Draw => {
                self.pointer = PointerState::Drawing {
                    anchor: world,
                    current: world,
                };
            }
            Tool::Select | Tool::Pan => {
                let tolerance = self.viewport.screen_dist_to_world(HIT_TOLERANCE_PX);
                self.selected = topmost_at(&self.shapes, world, tolerance).map(|s| s.id.clone());
                self.pointer = PointerState::Selecting;
                self.render.request();
            }
        }
    }

    pub fn pointer_move(&mut self, screen: Point, now: i64) {
        if self.destroyed {
            return;
        }
        let world = self.viewport.screen_to_world(screen);
        self.send_cursor(world, now);

        match self.pointer {
            PointerState::Panning { last } => {
                self.viewport.pan_by(screen.x - last.x, screen.y - last.y);
                self.pointer = PointerState::Panning { last: screen };
                self.render.request();
            }
            PointerState::Drawing { anchor, .. } => {
                self.pointer = PointerState::Drawing {
                    anchor,
                    current: world,
                };
                self.render.request();
            }
            PointerState::Idle | PointerState::Selecting => {}
        }
    }

    /// ポインターを離す。描画が確定した場合はその図形を返す
    pub fn pointer_up(&mut self, screen: Point, now: i64) -> Option<Shape> {
        if self.destroyed {
            return None;
        }
        let state = std::mem::replace(&mut self.pointer, PointerState::Idle);
        let PointerState::Drawing { anchor, .. } = state else {
            return None;
        };
        self.render.request();

        let end = self.viewport.screen_to_world(screen);
        if anchor.distance(&end) <= MIN_DRAG_DISTANCE {
            return None;
        }

        self.shape_seq += 1;
        let shape = Shape {
            id: format!("{}-{}-{}", self.config.identity, now, self.shape_seq),
            kind: self.draw_kind,
            color: self.draw_color,
            start_point: anchor,
            end_point: end,
            user_id: self.config.identity.clone(),
            timestamp: now,
        };
        self.shapes.upsert(shape.clone());
        self.revision += 1;
        self.push(ProtocolMessage::ShapeAdded {
            room_id: self.config.room_id.clone(),
            user_id: Some(self.config.identity.clone()),
            data: shape.clone(),
        });
        Some(shape)
    }

    /// 描画中のプレビュー図形
    pub fn preview(&self) -> Option<Shape> {
        let PointerState::Drawing { anchor, current } = self.pointer else {
            return None;
        };
        Some(Shape {
            id: "preview".to_string(),
            kind: self.draw_kind,
            color: self.draw_color,
            start_point: anchor,
            end_point: current,
            user_id: self.config.identity.clone(),
            timestamp: 0,
        })
    }

    /// ホイール操作。`delta_y` が負ならズームイン
    pub fn wheel(&mut self, screen: Point, delta_y: f64) {
        if self.destroyed {
            return;
        }
        let factor = if delta_y > 0.0 {
            ZOOM_OUT_FACTOR
        } else {
            ZOOM_IN_FACTOR
        };
        self.viewport.zoom_at(screen, factor);
        self.render.request();
    }

    /// 選択中の図形を削除する
    pub fn delete_selected(&mut self) -> Option<String> {
        if self.destroyed {
            return None;
        }
        let id = self.selected.take()?;
        self.shapes.remove(&id)?;
        self.revision += 1;
        self.render.request();
        self.push(ProtocolMessage::ShapeRemoved {
            room_id: self.config.room_id.clone(),
            user_id: Some(self.config.identity.clone()),
            data: ShapeRef { id: id.clone() },
        });
        Some(id)
    }

    /// 全図形を消去し、空のスナップショットで全員を置き換える
    pub fn clear(&mut self) {
        if self.destroyed {
            return;
        }
        self.shapes.clear();
        self.selected = None;
        self.revision += 1;
        self.render.request();
        self.push(ProtocolMessage::StateSync {
            room_id: self.config.room_id.clone(),
            user_id: Some(self.config.identity.clone()),
            data: CanvasData {
                shapes: Vec::new(),
                viewport: self.viewport,
            },
        });
    }

    pub fn send_chat(&mut self, text: &str) -> bool {
        if self.destroyed || text.trim().is_empty() {
            return false;
        }
        self.push(ProtocolMessage::Chat {
            room_id: self.config.room_id.clone(),
            text: text.to_string(),
            user_id: None,
            display_name: None,
            timestamp: None,
        });
        true
    }

    pub fn ping(&mut self, now: i64) {
        if self.destroyed {
            return;
        }
        self.push(ProtocolMessage::Ping {
            room_id: Some(self.config.room_id.clone()),
            timestamp: Some(now),
        });
    }

    /// カーソル位置を送る（一定間隔に 1 回まで）
    fn send_cursor(&mut self, world: Point, now: i64) -> bool {
        if let Some(last) = self.last_cursor_sent
            && now - last < self.config.cursor_throttle_ms
        {
            return false;
        }
        self.last_cursor_sent = Some(now);
        self.push(ProtocolMessage::CursorMove {
            room_id: self.config.room_id.clone(),
            user_id: Some(self.config.identity.clone()),
            display_name: Some(self.config.display_name.clone()),
            data: world,
        });
        true
    }

    // ========================================
    // リモートメッセージ
    // ========================================

    /// 受信したメッセージを反映する
    pub fn apply_remote(&mut self, message: ProtocolMessage, now: i64) -> Option<EngineEvent> {
        if self.destroyed {
            return None;
        }
        if message
            .room_id()
            .is_some_and(|room_id| room_id != self.config.room_id)
        {
            return None;
        }
        // 自分の操作は楽観的に反映済み
        if message.sender() == Some(self.config.identity.as_str()) {
            return None;
        }

        match message {
            ProtocolMessage::RoomState {
                shapes,
                viewport,
                members,
                ..
            } => {
                self.shapes.replace_all(shapes);
                self.viewport = viewport.clamped();
                self.members = members
                    .iter()
                    .map(|m| (m.user_id.clone(), m.display_name.clone()))
                    .collect();
                let members_ref = &self.members;
                self.cursors.retain(|id, _| members_ref.contains_key(id));
                self.drop_missing_selection();
                self.revision += 1;
                self.render.request();
                Some(EngineEvent::Snapshot {
                    shape_count: self.shapes.len(),
                    members,
                })
            }
            ProtocolMessage::MemberJoined {
                user_id,
                display_name,
                member_count,
                ..
            } => {
                self.members.insert(user_id.clone(), display_name.clone());
                self.render.request();
                Some(EngineEvent::MemberJoined {
                    user_id,
                    display_name,
                    member_count,
                })
            }
            ProtocolMessage::MemberLeft {
                user_id,
                display_name,
                member_count,
                ..
            } => {
                self.members.remove(&user_id);
                self.cursors.remove(&user_id);
                self.render.request();
                Some(EngineEvent::MemberLeft {
                    user_id,
                    display_name,
                    member_count,
                })
            }
            ProtocolMessage::Chat {
                text,
                user_id,
                display_name,
                timestamp,
                ..
            } => Some(EngineEvent::Chat {
                user_id: user_id.unwrap_or_default(),
                display_name: display_name.unwrap_or_else(|| "Anonymous".to_string()),
                text,
                timestamp: timestamp.unwrap_or(now),
            }),
            ProtocolMessage::ShapeAdded { data, .. } | ProtocolMessage::ShapeUpdated { data, .. } => {
                self.shapes.upsert(data);
                self.revision += 1;
                self.render.request();
                None
            }
            ProtocolMessage::ShapeRemoved { data, .. } => {
                self.shapes.remove(&data.id);
                self.drop_missing_selection();
                self.revision += 1;
                self.render.request();
                None
            }
            ProtocolMessage::StateSync { data, .. } => {
                self.shapes.replace_all(data.shapes);
                self.viewport = data.viewport.clamped();
                self.drop_missing_selection();
                self.revision += 1;
                self.render.request();
                None
            }
            ProtocolMessage::CursorMove {
                user_id: Some(user_id),
                display_name,
                data,
                ..
            } => {
                let display_name = display_name.unwrap_or_else(|| user_id.clone());
                self.cursors.insert(
                    user_id,
                    RemoteCursor {
                        display_name,
                        position: data,
                        updated_at: now,
                    },
                );
                self.render.request();
                None
            }
            ProtocolMessage::Pong { timestamp } => Some(EngineEvent::Pong { timestamp }),
            ProtocolMessage::CursorMove { user_id: None, .. }
            | ProtocolMessage::JoinRoom { .. }
            | ProtocolMessage::LeaveRoom { .. }
            | ProtocolMessage::Ping { .. } => None,
        }
    }

    fn drop_missing_selection(&mut self) {
        if let Some(id) = &self.selected
            && !self.shapes.contains(id)
        {
            self.selected = None;
        }
    }

    // ========================================
    // スケジューリング
    // ========================================

    /// 描画 tick。期限切れのカーソルを消し、再描画要求があれば 1 フレーム返す
    pub fn tick(&mut self, now: i64) -> Option<Frame> {
        if self.destroyed {
            return None;
        }
        let ttl = self.config.cursor_ttl_ms;
        let before = self.cursors.len();
        self.cursors.retain(|_, cursor| now - cursor.updated_at < ttl);
        if self.cursors.len() != before {
            self.render.request();
        }

        if !self.render.take_frame() {
            return None;
        }
        Some(Frame {
            revision: self.revision,
            shape_count: self.shapes.len(),
            viewport: self.viewport,
            cursor_count: self.cursors.len(),
            selected: self.selected.clone(),
            preview: self.preview(),
        })
    }

    /// 送信待ちのメッセージを取り出す
    pub fn take_outbound(&mut self) -> Vec<ProtocolMessage> {
        self.outbox.drain(..).collect()
    }

    /// エンジンを破棄する。以降の操作と受信はすべて無視される
    pub fn destroy(&mut self) {
        self.destroyed = true;
        self.render.stop();
        self.outbox.clear();
        self.pointer = PointerState::Idle;
        self.cursors.clear();
    }

    fn push(&mut self, message: ProtocolMessage) {
        self.outbox.push_back(message);
    }
}
