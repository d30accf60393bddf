//! JSON Lines ファイルに追記する ChatStore 実装
//!
//! 1 メッセージ = 1 行。書き込みは追記のみで、既存の行は変更しない。
//! 読み出し時に壊れた行はスキップする。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};

use crate::{
    domain::{ChatMessage, ChatStore, ChatStoreError, RoomId},
    infrastructure::dto::record::ChatRecord,
};

pub struct FileChatStore {
    path: PathBuf,
    /// 追記の直列化
    write_lock: Mutex<()>,
}

impl FileChatStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn append(&self, message: ChatMessage) -> Result<(), ChatStoreError> {
        let mut line = serde_json::to_string(&ChatRecord::from(message))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn recent(
        &self,
        room_id: &RoomId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatStoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut matching: Vec<ChatMessage> = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = match serde_json::from_str::<ChatRecord>(line) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Skipping unreadable chat log line {}: {}", index + 1, e);
                    continue;
                }
            };
            if record.room_id != room_id.as_str() {
                continue;
            }
            match ChatMessage::try_from(record) {
                Ok(message) => matching.push(message),
                Err(e) => tracing::warn!("Skipping invalid chat log line {}: {}", index + 1, e),
            }
        }

        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).collect())
    }
}
