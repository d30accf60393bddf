//! Server state shared by every handler.

use std::sync::Arc;

use crate::usecase::{
    ConnectParticipantUseCase, DisconnectParticipantUseCase, GetChatHistoryUseCase,
    GetRoomDetailUseCase, GetRoomsUseCase, RouteMessageUseCase,
};

use super::shutdown::ShutdownCoordinator;

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（参加者接続のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// RouteMessageUseCase（受信メッセージの振り分け）
    pub route_message_usecase: Arc<RouteMessageUseCase>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    /// GetChatHistoryUseCase（チャット履歴取得のユースケース）
    pub get_chat_history_usecase: Arc<GetChatHistoryUseCase>,
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Per-connection outbound queue capacity
    pub outbound_queue_capacity: usize,
}
