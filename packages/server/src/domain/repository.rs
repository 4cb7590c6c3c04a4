//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{Appointment, ChatMessage, Consultation, NewMessage, RoomId, StoreError, UserId};

/// Message Store trait
///
/// チャットメッセージを Room ID ごとに追記保存する永続ストア。
/// Consultation が既に存在するかどうかの正でもあります。
///
/// ## 並行性
///
/// 複数プロセスから同時に呼ばれても整合性を保つのはストア自身の責務です。
/// `create_consultation` は一意制約の競合を「既存レコードを返す」で解決し、
/// 呼び出し側にエラーを返してはいけません。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Consultation を取得（存在しなければ `None`）
    async fn find_consultation(&self, room_id: &RoomId)
    -> Result<Option<Consultation>, StoreError>;

    /// Consultation を作成（既に存在する場合は既存のものを返す）
    async fn create_consultation(
        &self,
        room_id: &RoomId,
        patient_id: &UserId,
        doctor_id: &UserId,
    ) -> Result<Consultation, StoreError>;

    /// メッセージを追記し、ID と作成時刻が採番されたメッセージを返す
    async fn append_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Room のメッセージを作成順に取得
    async fn list_messages(&self, room_id: &RoomId) -> Result<Vec<ChatMessage>, StoreError>;

    /// `reader_id` 以外が送信したメッセージを既読にし、更新件数を返す
    async fn mark_read(&self, room_id: &RoomId, reader_id: &UserId) -> Result<u64, StoreError>;
}

/// Appointment Directory trait
///
/// 予約 ID から患者と医師を引く外部システムへのインターフェース。
/// Consultation の作成時にだけ使います。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentDirectory: Send + Sync {
    async fn find_appointment(&self, room_id: &RoomId) -> Result<Option<Appointment>, StoreError>;
}
