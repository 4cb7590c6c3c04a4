//! Repository 実装
//!
//! - `inmemory`: HashMap を使った実装（開発・テスト用）
//! - `sqlite`: sqlx + SQLite を使った永続実装

pub mod inmemory;
pub mod sqlite;

pub use inmemory::{InMemoryAppointmentDirectory, InMemoryMessageStore};
pub use sqlite::SqliteMessageStore;
