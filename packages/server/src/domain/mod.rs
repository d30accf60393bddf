//! Domain layer: value objects, entities, and the interfaces the use cases depend on.

pub mod collaborator;
pub mod command;
pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod repository;
pub mod value_object;

pub use collaborator::{ChatStore, CredentialVerifier, VerifiedUser};
pub use command::RoomCommand;
pub use entity::{
    ChatMessage, Connection, Departure, JoinOutcome, Participant, Registration, Room,
};
pub use error::{AuthError, ChatStoreError, MessagePushError, RepositoryError, ValueObjectError};
pub use message_pusher::{BroadcastReport, MessagePusher, PusherChannel};
pub use repository::RoomRepository;
pub use value_object::{
    ChatText, ConnectionId, ConnectionKey, DisplayName, Identity, RoomId, Timestamp,
};

#[cfg(test)]
pub use collaborator::{MockChatStore, MockCredentialVerifier};
#[cfg(test)]
pub use message_pusher::MockMessagePusher;
#[cfg(test)]
pub use repository::MockRoomRepository;
