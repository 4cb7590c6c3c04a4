//! SQLite Message Store 実装
//!
//! sqlx を使った永続実装。複数プロセスから同じ DB を使っても整合性が保たれるよう、
//! 重複作成の防止は `consultations.room_id` の一意制約に任せています。
//!
//! ```text
//! DB Row → *Row (FromRow) → ドメインモデル
//! ```

use std::{str::FromStr, sync::Arc, time::Duration};

use async_trait::async_trait;
use carelink_shared::time::{Clock, SystemClock};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::domain::{
    Appointment, AppointmentDirectory, ChatMessage, Consultation, MessageContent, MessageId,
    MessageIdFactory, MessageKind, MessageStore, NewMessage, ParticipantRole, RoomId, StoreError,
    Timestamp, UserId,
};

const SCHEMA: [&str; 4] = [
    "CREATE TABLE IF NOT EXISTS appointments (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        doctor_id TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS consultations (
        room_id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        doctor_id TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        sequence INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        room_id TEXT NOT NULL REFERENCES consultations (room_id),
        sender_id TEXT NOT NULL,
        sender_role TEXT NOT NULL,
        content TEXT NOT NULL,
        kind TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS messages_room_order ON messages (room_id, created_at, sequence)",
];

fn unavailable(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn corrupt(error: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(error.to_string())
}

#[derive(FromRow)]
struct AppointmentRow {
    id: String,
    patient_id: String,
    doctor_id: String,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment::new(
            RoomId::new(row.id).map_err(corrupt)?,
            UserId::new(row.patient_id).map_err(corrupt)?,
            UserId::new(row.doctor_id).map_err(corrupt)?,
        ))
    }
}

#[derive(FromRow)]
struct ConsultationRow {
    room_id: String,
    patient_id: String,
    doctor_id: String,
    created_at: i64,
}

impl TryFrom<ConsultationRow> for Consultation {
    type Error = StoreError;

    fn try_from(row: ConsultationRow) -> Result<Self, Self::Error> {
        Ok(Consultation::new(
            RoomId::new(row.room_id).map_err(corrupt)?,
            UserId::new(row.patient_id).map_err(corrupt)?,
            UserId::new(row.doctor_id).map_err(corrupt)?,
            Timestamp::new(row.created_at),
        ))
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    room_id: String,
    sender_id: String,
    sender_role: String,
    content: String,
    kind: String,
    created_at: i64,
    is_read: bool,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            id: MessageId::new(row.id).map_err(corrupt)?,
            room_id: RoomId::new(row.room_id).map_err(corrupt)?,
            sender_id: UserId::new(row.sender_id).map_err(corrupt)?,
            sender_role: ParticipantRole::from_str(&row.sender_role).map_err(corrupt)?,
            content: MessageContent::new(row.content).map_err(corrupt)?,
            kind: MessageKind::from_str(&row.kind).map_err(corrupt)?,
            created_at: Timestamp::new(row.created_at),
            is_read: row.is_read,
        })
    }
}

/// SQLite Message Store 実装
///
/// `AppointmentDirectory` も同じ DB の `appointments` テーブルで実装します。
pub struct SqliteMessageStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteMessageStore {
    /// DB に接続し、スキーマを作成する
    ///
    /// `sqlite::memory:` の場合は接続を一本に固定します（接続ごとに別の DB になるため）。
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(unavailable)?
            .create_if_missing(true);
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.migrate().await?;
        Ok(store)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;
        }
        Ok(())
    }

    /// 予約を登録（既存の場合は参加者を更新）
    pub async fn upsert_appointment(&self, appointment: &Appointment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO appointments (id, patient_id, doctor_id) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET patient_id = excluded.patient_id, doctor_id = excluded.doctor_id",
        )
        .bind(appointment.id.as_str())
        .bind(appointment.patient_id.as_str())
        .bind(appointment.doctor_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn consultation_exists(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM consultations WHERE room_id = ?")
            .bind(room_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn find_consultation(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<Consultation>, StoreError> {
        let row = sqlx::query_as::<_, ConsultationRow>(
            "SELECT room_id, patient_id, doctor_id, created_at FROM consultations WHERE room_id = ?",
        )
        .bind(room_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(Consultation::try_from).transpose()
    }

    async fn create_consultation(
        &self,
        room_id: &RoomId,
        patient_id: &UserId,
        doctor_id: &UserId,
    ) -> Result<Consultation, StoreError> {
        // 一意制約の競合は無視し、勝った側のレコードを読み直す
        sqlx::query(
            "INSERT INTO consultations (room_id, patient_id, doctor_id, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(room_id) DO NOTHING",
        )
        .bind(room_id.as_str())
        .bind(patient_id.as_str())
        .bind(doctor_id.as_str())
        .bind(self.clock.now_millis())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        self.find_consultation(room_id)
            .await?
            .ok_or_else(|| StoreError::ConsultationNotFound(room_id.to_string()))
    }

    async fn append_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM consultations WHERE room_id = ?")
            .bind(message.room_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(unavailable)?;
        if exists.is_none() {
            return Err(StoreError::ConsultationNotFound(message.room_id.to_string()));
        }

        // Room 内の created_at を単調非減少に保つ
        let latest = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(created_at) FROM messages WHERE room_id = ?",
        )
        .bind(message.room_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(unavailable)?;
        let now = self.clock.now_millis();
        let created_at = Timestamp::new(latest.map_or(now, |latest| now.max(latest)));

        let id = MessageIdFactory::generate();
        sqlx::query(
            "INSERT INTO messages (id, room_id, sender_id, sender_role, content, kind, created_at, is_read)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
        )
        .bind(id.as_str())
        .bind(message.room_id.as_str())
        .bind(message.sender_id.as_str())
        .bind(message.sender_role.as_str())
        .bind(message.content.as_str())
        .bind(message.kind.as_str())
        .bind(created_at.value())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        Ok(ChatMessage {
            id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_role: message.sender_role,
            content: message.content,
            kind: message.kind,
            created_at,
            is_read: false,
        })
    }

    async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, room_id, sender_id, sender_role, content, kind, created_at, is_read
             FROM messages WHERE room_id = ? ORDER BY created_at, sequence",
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn mark_read(&self, room_id: &RoomId, reader_id: &UserId) -> Result<u64, StoreError> {
        if !self.consultation_exists(room_id).await? {
            return Err(StoreError::ConsultationNotFound(room_id.to_string()));
        }

        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE room_id = ? AND sender_id != ? AND is_read = 0",
        )
        .bind(room_id.as_str())
        .bind(reader_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AppointmentDirectory for SqliteMessageStore {
    async fn find_appointment(&self, room_id: &RoomId) -> Result<Option<Appointment>, StoreError> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            "SELECT id, patient_id, doctor_id FROM appointments WHERE id = ?",
        )
        .bind(room_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(Appointment::try_from).transpose()
    }
}
