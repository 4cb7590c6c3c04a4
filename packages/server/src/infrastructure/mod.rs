//! Infrastructure layer: wire DTOs, message pushers and store implementations.

pub mod dto;
pub mod message_pusher;
pub mod repository;
