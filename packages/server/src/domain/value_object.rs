//! Value Object 定義
//!
//! 不変で、値そのものによって同一性が決まるドメインの値を定義します。
//! 生成時にバリデーションを行い、不正な値がドメイン層に入り込まないようにします。

use std::fmt;

use serde::{Deserialize, Serialize};
use tegaki_shared::{protocol::validate_room_id, sanitize::sanitize_chat_text};
use uuid::Uuid;

use super::error::ValueObjectError;

/// 認証済みのユーザー識別子
///
/// トークンから導出される不透明な文字列。再接続しても同じ値になる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().is_empty() {
            return Err(ValueObjectError::EmptyIdentity);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identity {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// 表示名（空の場合は "Anonymous"）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayName(String);

impl DisplayName {
    pub const ANONYMOUS: &'static str = "Anonymous";

    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self(Self::ANONYMOUS.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Default for DisplayName {
    fn default() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ルーム識別子（1〜64 文字）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate_room_id(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// サニタイズ済みのチャット本文
///
/// 制御文字の除去・連続スペースの圧縮・トリム・最大長での切り詰めを行った後の値。
/// サニタイズ後に空になる入力は受け付けない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatText(String);

impl ChatText {
    pub fn new(raw: &str, max_len: usize) -> Result<Self, ValueObjectError> {
        let sanitized = sanitize_chat_text(raw, max_len);
        if sanitized.is_empty() {
            return Err(ValueObjectError::EmptyChatText);
        }
        Ok(Self(sanitized))
    }

    /// 既にサニタイズ済みの値を復元する（永続化層からの読み出し用）
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Unix ミリ秒のタイムスタンプ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// 1 本のソケット接続を表す識別子
///
/// 同じ Identity で再接続した場合に古い接続の後始末を区別するための世代 ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 接続を一意に指すキー（Identity + 世代）
///
/// リポジトリや MessagePusher への操作はこのキーで行い、
/// 置き換え済みの古い接続からの操作を弾く。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub identity: Identity,
    pub connection_id: ConnectionId,
}

impl ConnectionKey {
    pub fn new(identity: Identity, connection_id: ConnectionId) -> Self {
        Self {
            identity,
            connection_id,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.identity, self.connection_id)
    }
}
