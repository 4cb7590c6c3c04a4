//! エンティティ

use serde::Serialize;

use super::value_object::{
    MessageContent, MessageId, MessageKind, ParticipantRole, RoomId, Timestamp, UserId,
};

/// 予約（外部システムが管理）
///
/// Consultation を作成するときだけ参照します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: RoomId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
}

impl Appointment {
    pub fn new(id: RoomId, patient_id: UserId, doctor_id: UserId) -> Self {
        Self {
            id,
            patient_id,
            doctor_id,
        }
    }
}

/// 診察記録（永続化される）
///
/// Room と同じ ID をキーに持ち、全てのチャットメッセージの親になります。
/// 一度だけ作成され、再接続をまたいで再利用されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consultation {
    pub room_id: RoomId,
    pub patient_id: UserId,
    pub doctor_id: UserId,
    pub created_at: Timestamp,
}

impl Consultation {
    pub fn new(
        room_id: RoomId,
        patient_id: UserId,
        doctor_id: UserId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            room_id,
            patient_id,
            doctor_id,
            created_at,
        }
    }

    /// 指定ユーザーがこの診察の患者または医師か
    pub fn is_participant(&self, user_id: &UserId) -> bool {
        &self.patient_id == user_id || &self.doctor_id == user_id
    }
}

/// 永続化前のメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_role: ParticipantRole,
    pub content: MessageContent,
    pub kind: MessageKind,
}

/// 永続化済みのチャットメッセージ
///
/// `id` と `created_at` はストアが採番します。`is_read` 以外は変更されません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_role: ParticipantRole,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub created_at: Timestamp,
    pub is_read: bool,
}

/// 接続元のユーザー（セッションプロバイダが提供）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: ParticipantRole,
}
