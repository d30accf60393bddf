//! Tegaki relay library.
//!
//! Hosts rooms for the collaborative canvas: authenticates sockets, tracks room
//! membership, applies shape operations to the room snapshot and fans messages
//! out to the other members.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
