//! HTTP API response DTOs.

use serde::Serialize;

use crate::domain::ParticipantRole;

use super::websocket::MessageDto;

/// Live state of one room, taken from the signaling hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub appointment_id: String,
    pub members: Vec<MemberDto>,
    pub typing: Vec<ParticipantRole>,
    pub ready: Vec<ParticipantRole>,
}

/// One connection in a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub connection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ParticipantRole>,
}

/// Persisted history of one consultation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationMessagesDto {
    pub appointment_id: String,
    pub patient_id: String,
    pub doctor_id: String,
    /// RFC 3339 (UTC)
    pub created_at: String,
    pub messages: Vec<MessageDto>,
}
