//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{RoomId, StoreError, UserId};

/// Signaling Hub のエラー
///
/// `Display` の文字列がそのまま `error` イベントとして送信者に届きます。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("not a member of appointment '{0}'")]
    NotAMember(RoomId),

    #[error("unknown appointment '{0}'")]
    UnknownRoom(RoomId),

    #[error("user '{0}' is not a participant of this consultation")]
    NotAParticipant(UserId),

    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("connection '{0}' not found")]
    TargetNotFound(String),

    #[error("signaling hub is closed")]
    HubClosed,
}

impl From<StoreError> for HubError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ConsultationNotFound(room_id) => match RoomId::new(room_id.clone()) {
                Ok(room_id) => Self::UnknownRoom(room_id),
                Err(_) => Self::StoreUnavailable(format!("consultation '{room_id}' not found")),
            },
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Room 詳細取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("room not found")]
    RoomNotFound,

    #[error("signaling hub unavailable")]
    HubUnavailable,
}

/// 診察メッセージ取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetConsultationMessagesError {
    #[error("consultation '{0}' not found")]
    NotFound(RoomId),

    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),
}
