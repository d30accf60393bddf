//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! 接続テーブル（Connection）とルームレジストリ（Room）は同じ Repository が保持し、
//! 参加・退出は両側を 1 回の操作で更新する。これにより
//! 「接続が参加中と記録しているルーム」と「ルームのメンバー集合」が常に一致する。

use async_trait::async_trait;
use tegaki_shared::canvas::{CanvasData, ShapeOp};

use super::{
    Connection, ConnectionKey, Departure, Identity, JoinOutcome, Registration, RepositoryError,
    Room, RoomId, Timestamp,
};

/// 接続テーブル + ルームレジストリ
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 接続を登録する
    ///
    /// 同じ Identity の接続が既にあれば置き換え、古い接続のルーム参加をすべて解放する。
    async fn register_connection(&self, connection: Connection) -> Registration;

    /// 接続を削除し、参加していた全ルームから退出させる
    ///
    /// キーが現在の接続と一致しない（置き換え済み）場合は `StaleConnection`。
    async fn unregister_connection(
        &self,
        key: &ConnectionKey,
    ) -> Result<Vec<Departure>, RepositoryError>;

    /// 接続を取得
    async fn get_connection(&self, identity: &Identity) -> Option<Connection>;

    /// 最終アクティビティ時刻を更新
    async fn touch(&self, key: &ConnectionKey, now: Timestamp) -> Result<(), RepositoryError>;

    /// ルームに参加する（ルームが無ければ作成、参加済みなら no-op）
    async fn join(
        &self,
        key: &ConnectionKey,
        room_id: &RoomId,
        now: Timestamp,
    ) -> Result<JoinOutcome, RepositoryError>;

    /// ルームから退出する（参加していなければ `None`）
    ///
    /// メンバーが 0 人になったルームは破棄される。
    async fn leave(
        &self,
        key: &ConnectionKey,
        room_id: &RoomId,
    ) -> Result<Option<Departure>, RepositoryError>;

    /// 図形操作をルームのスナップショットに適用
    async fn apply_shape_op(
        &self,
        room_id: &RoomId,
        op: ShapeOp,
        now: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// ルームのスナップショット全体を置き換え
    async fn replace_canvas(
        &self,
        room_id: &RoomId,
        data: CanvasData,
        now: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// 接続がルームのメンバーか
    async fn is_member(&self, key: &ConnectionKey, room_id: &RoomId) -> bool;

    /// ルームのメンバー一覧
    async fn members(&self, room_id: &RoomId) -> Vec<Identity>;

    /// Room エンティティを取得
    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError>;

    /// 全ルームを取得
    async fn list_rooms(&self) -> Vec<Room>;

    /// 接続数を取得
    async fn count_connections(&self) -> usize;
}
