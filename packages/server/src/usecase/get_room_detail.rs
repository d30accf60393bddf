//! UseCase: ルーム詳細取得

use std::sync::Arc;

use crate::domain::{RepositoryError, Room, RoomId, RoomRepository};

use super::error::GetRoomDetailError;

pub struct GetRoomDetailUseCase {
    repository: Arc<dyn RoomRepository>,
}

impl GetRoomDetailUseCase {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, room_id: String) -> Result<Room, GetRoomDetailError> {
        let room_id = RoomId::new(room_id)?;
        self.repository
            .get_room(&room_id)
            .await
            .map_err(|e| match e {
                RepositoryError::RoomNotFound(_) => GetRoomDetailError::RoomNotFound,
                other => {
                    tracing::warn!("Unexpected repository error: {}", other);
                    GetRoomDetailError::RoomNotFound
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::test_support::{Harness, room_id};

    #[tokio::test]
    async fn test_get_room_detail_found_and_not_found() {
        // テスト項目: 生存中のルームは取得でき、存在しないルームは RoomNotFound になる
        // given (前提条件):
        let harness = Harness::new();
        let (alice, _rx) = harness.connect("alice").await;
        harness.join_room().execute(&alice, room_id("demo")).await.unwrap();
        let usecase = GetRoomDetailUseCase::new(harness.repository.clone());

        // when (操作):
        let found = usecase.execute("demo".to_string()).await;
        let missing = usecase.execute("ghost".to_string()).await;

        // then (期待する結果):
        assert_eq!(found.map(|r| r.member_count()), Ok(1));
        assert_eq!(missing, Err(GetRoomDetailError::RoomNotFound));
    }
}
