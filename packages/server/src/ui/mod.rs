//! HTTP and WebSocket surface of the consultation relay.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
