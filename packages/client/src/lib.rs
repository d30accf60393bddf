//! Tegaki client: a canvas sync engine that mirrors one room of a Tegaki relay,
//! with reconnection and a terminal front end.

pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod room_lookup;
pub mod runner;
pub mod session;
pub mod ui;

pub use runner::run_client;
