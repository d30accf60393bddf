//! Axum front end of the relay.

mod handler;
mod server;
mod signal;
pub mod shutdown;
pub mod state;

pub use server::Server;
pub use shutdown::ShutdownCoordinator;
pub use state::AppState;
