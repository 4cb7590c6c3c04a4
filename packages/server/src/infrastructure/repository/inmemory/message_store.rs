//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//!
//! 全ての操作は一つの Mutex の下で行われるため、Consultation の作成は
//! 原子的で、メッセージの採番順は Room ごとに全順序になります。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use carelink_shared::time::{Clock, SystemClock};
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, Consultation, MessageIdFactory, MessageStore, NewMessage, RoomId, StoreError,
    Timestamp, UserId,
};

/// Room ごとに保持するデータ
struct ConsultationRecord {
    consultation: Consultation,
    /// 作成順（`created_at`、同値はシーケンス順）に並んだメッセージ
    messages: Vec<StoredMessage>,
}

struct StoredMessage {
    sequence: u64,
    message: ChatMessage,
}

#[derive(Default)]
struct Inner {
    consultations: HashMap<RoomId, ConsultationRecord>,
    next_sequence: u64,
}

/// インメモリ Message Store 実装
pub struct InMemoryMessageStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    /// 新しい InMemoryMessageStore を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn find_consultation(
        &self,
        room_id: &RoomId,
    ) -> Result<Option<Consultation>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .consultations
            .get(room_id)
            .map(|record| record.consultation.clone()))
    }

    async fn create_consultation(
        &self,
        room_id: &RoomId,
        patient_id: &UserId,
        doctor_id: &UserId,
    ) -> Result<Consultation, StoreError> {
        let created_at = Timestamp::new(self.clock.now_millis());
        let mut inner = self.inner.lock().await;

        // 既に存在する場合は既存のものを返す（一意制約の競合 = 成功）
        let record = inner
            .consultations
            .entry(room_id.clone())
            .or_insert_with(|| ConsultationRecord {
                consultation: Consultation::new(
                    room_id.clone(),
                    patient_id.clone(),
                    doctor_id.clone(),
                    created_at,
                ),
                messages: Vec::new(),
            });

        Ok(record.consultation.clone())
    }

    async fn append_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock().await;

        let sequence = inner.next_sequence;
        let record = inner
            .consultations
            .get_mut(&message.room_id)
            .ok_or_else(|| StoreError::ConsultationNotFound(message.room_id.to_string()))?;

        // 時計が戻っても Room 内の created_at は単調非減少に保つ
        let latest = record
            .messages
            .last()
            .map_or(i64::MIN, |stored| stored.message.created_at.value());
        let created_at = Timestamp::new(now.max(latest));

        let stored = ChatMessage {
            id: MessageIdFactory::generate(),
            room_id: message.room_id,
            sender_id: message.sender_id,
            sender_role: message.sender_role,
            content: message.content,
            kind: message.kind,
            created_at,
            is_read: false,
        };
        record.messages.push(StoredMessage {
            sequence,
            message: stored.clone(),
        });
        inner.next_sequence += 1;

        Ok(stored)
    }

    async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(record) = inner.consultations.get(room_id) else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<&StoredMessage> = record.messages.iter().collect();
        messages.sort_by_key(|stored| (stored.message.created_at, stored.sequence));
        Ok(messages
            .into_iter()
            .map(|stored| stored.message.clone())
            .collect())
    }

    async fn mark_read(&self, room_id: &RoomId, reader_id: &UserId) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .consultations
            .get_mut(room_id)
            .ok_or_else(|| StoreError::ConsultationNotFound(room_id.to_string()))?;

        let mut updated = 0;
        for stored in record.messages.iter_mut() {
            if &stored.message.sender_id != reader_id && !stored.message.is_read {
                stored.message.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
