//! Infrastructure layer: concrete implementations of the domain interfaces.

pub mod auth;
pub mod chat_store;
pub mod dto;
pub mod message_pusher;
pub mod repository;
