//! Pure client-side logic: the canvas sync engine, hit testing, and the
//! reconnection state machine. Nothing here performs I/O.

pub mod engine;
pub mod geometry;
pub mod reconnect;

pub use engine::{
    EngineConfig, EngineEvent, Frame, PointerButton, PointerState, RemoteCursor, SyncEngine, Tool,
};
pub use reconnect::{ConnectionState, NextStep, ReconnectController, ReconnectPolicy};
