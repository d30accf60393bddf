//! UseCase 層
//!
//! 1 つの操作につき 1 つのユースケースを定義する。
//! 同じルームへの変更とその通知は `RoomLocks` で直列化される。

pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod get_chat_history;
pub mod get_room_detail;
pub mod get_rooms;
pub mod join_room;
pub mod leave_room;
pub mod notification;
pub mod room_lock;
pub mod route_message;
pub mod send_message;

#[cfg(test)]
pub(crate) mod test_support;

pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, GetChatHistoryError, GetRoomDetailError, RouteError};
pub use get_chat_history::GetChatHistoryUseCase;
pub use get_room_detail::GetRoomDetailUseCase;
pub use get_rooms::GetRoomsUseCase;
pub use join_room::JoinRoomUseCase;
pub use leave_room::LeaveRoomUseCase;
pub use room_lock::RoomLocks;
pub use route_message::{RouteMessageUseCase, RouteOutcome};
pub use send_message::{ChatDispatch, SendMessageUseCase};
