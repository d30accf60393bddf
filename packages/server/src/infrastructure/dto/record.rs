//! 永続化レコードの DTO

use serde::{Deserialize, Serialize};

/// チャットログ 1 行分のレコード（JSON Lines）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub room_id: String,
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub timestamp: i64,
}
