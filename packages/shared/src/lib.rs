//! Shared building blocks for the Tegaki relay and client.
//!
//! - `canvas`: the drawing model replicated between peers
//! - `protocol`: JSON wire messages exchanged over the WebSocket
//! - `sanitize`: chat text normalization
//! - `logger` / `time`: ambient utilities

pub mod canvas;
pub mod error;
pub mod logger;
pub mod protocol;
pub mod sanitize;
pub mod time;
