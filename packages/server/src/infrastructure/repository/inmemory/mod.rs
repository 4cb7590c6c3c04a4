//! InMemory 実装

mod appointment;
mod message_store;

pub use appointment::InMemoryAppointmentDirectory;
pub use message_store::InMemoryMessageStore;
