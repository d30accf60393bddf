//! Entity 定義
//!
//! - `Connection`: 1 本の生存中ソケットと、その接続が参加しているルームの集合
//! - `Participant`: 認証済みの接続主体
//! - `Room`: メンバー集合とキャンバスのスナップショット
//! - `ChatMessage`: 永続化されるチャットメッセージ（一度書いたら変更しない）
//! - `Departure`: ルームからの退出結果（member_left の通知に使う）

use std::collections::{BTreeMap, BTreeSet};

use tegaki_shared::canvas::{CanvasData, ShapeCollection, ShapeOp, Viewport};

use super::value_object::{
    ChatText, ConnectionId, ConnectionKey, DisplayName, Identity, RoomId, Timestamp,
};

/// 生存中の接続
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub identity: Identity,
    pub display_name: DisplayName,
    pub connection_id: ConnectionId,
    /// 参加中のルーム（Room 側のメンバー集合と常に一致させる）
    pub rooms: BTreeSet<RoomId>,
    pub connected_at: Timestamp,
    pub last_activity: Timestamp,
}

impl Connection {
    pub fn new(
        identity: Identity,
        display_name: DisplayName,
        connection_id: ConnectionId,
        connected_at: Timestamp,
    ) -> Self {
        Self {
            identity,
            display_name,
            connection_id,
            rooms: BTreeSet::new(),
            connected_at,
            last_activity: connected_at,
        }
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey::new(self.identity.clone(), self.connection_id)
    }

    pub fn matches(&self, key: &ConnectionKey) -> bool {
        self.identity == key.identity && self.connection_id == key.connection_id
    }
}

/// 認証済みの接続主体（ルーム操作の送信者）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub key: ConnectionKey,
    pub display_name: DisplayName,
}

impl Participant {
    pub fn new(key: ConnectionKey, display_name: DisplayName) -> Self {
        Self { key, display_name }
    }

    pub fn identity(&self) -> &Identity {
        &self.key.identity
    }
}

/// ルーム
///
/// 最初の join で遅延生成され、メンバーが 0 人になった時点で破棄される。
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    /// メンバーと表示名
    pub members: BTreeMap<Identity, DisplayName>,
    pub shapes: ShapeCollection,
    pub viewport: Viewport,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
}

impl Room {
    pub fn new(id: RoomId, created_at: Timestamp) -> Self {
        Self {
            id,
            members: BTreeMap::new(),
            shapes: ShapeCollection::new(),
            viewport: Viewport::default(),
            created_at,
            last_modified: created_at,
        }
    }

    /// メンバーを追加（既に参加済みなら `false`）
    pub fn add_member(&mut self, identity: Identity, display_name: DisplayName) -> bool {
        self.members.insert(identity, display_name).is_none()
    }

    /// メンバーを削除（参加していなければ `None`）
    pub fn remove_member(&mut self, identity: &Identity) -> Option<DisplayName> {
        self.members.remove(identity)
    }

    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains_key(identity)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 図形操作を適用（Last-Write-Wins）
    pub fn apply(&mut self, op: ShapeOp, now: Timestamp) {
        self.shapes.apply(op);
        self.last_modified = now;
    }

    /// スナップショット全体を置き換える
    pub fn replace_canvas(&mut self, data: CanvasData, now: Timestamp) {
        self.shapes.replace_all(data.shapes);
        self.viewport = data.viewport.clamped();
        self.last_modified = now;
    }

    pub fn snapshot(&self) -> CanvasData {
        CanvasData {
            shapes: self.shapes.to_vec(),
            viewport: self.viewport,
        }
    }
}

/// チャットメッセージ
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub author: Identity,
    pub display_name: DisplayName,
    pub text: ChatText,
    pub timestamp: Timestamp,
}

/// ルームからの退出結果
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub room_id: RoomId,
    pub identity: Identity,
    pub display_name: DisplayName,
    /// 退出後のメンバー数
    pub member_count: usize,
    /// 退出によりルームが破棄されたか
    pub room_removed: bool,
}

/// join の結果
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// join 後のルーム（スナップショット送信に使う）
    pub room: Room,
    /// 新規参加か（既に参加済みなら `false`）
    pub newly_joined: bool,
}

/// 接続登録の結果
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// 同じ Identity の既存接続（置き換えられた場合）
    pub replaced: Option<Connection>,
    /// 置き換えにより解放されたルーム参加
    pub departures: Vec<Departure>,
}
