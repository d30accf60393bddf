//! Data Transfer Objects (DTOs) for the relay.
//!
//! - `conversion`: wire / record / HTTP DTO ↔ domain conversions
//! - `http`: HTTP API response DTOs
//! - `record`: persisted chat log records

pub mod conversion;
pub mod http;
pub mod record;
