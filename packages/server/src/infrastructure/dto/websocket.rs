//! WebSocket message DTOs.
//!
//! Every frame is a JSON text message of the form
//! `{"event": "<name>", "data": <payload>}`. Event names and payload field
//! names are part of the wire contract with the browser client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{MessageKind, ParticipantRole};

/// Events sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomRef),
    SendMessage(SendMessagePayload),
    MarkMessagesRead(MarkReadPayload),
    UserReady(ReadyPayload),
    CheckRoom(RoomRef),
    StartVideoCall(RoomRef),
    AcceptCall(AcceptCallPayload),
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
    EndCall(RoomRef),
    TypingStart(TypingPayload),
    TypingStop(TypingPayload),
    LeaveAppointment(RoomRef),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub appointment_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub appointment_id: String,
    pub sender_id: String,
    pub sender_role: ParticipantRole,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub appointment_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    pub appointment_id: String,
    pub role: ParticipantRole,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptCallPayload {
    pub to: String,
    pub appointment_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub appointment_id: Option<String>,
    pub to: Option<String>,
    pub offer: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub appointment_id: Option<String>,
    pub to: Option<String>,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidatePayload {
    pub appointment_id: Option<String>,
    pub to: Option<String>,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub appointment_id: String,
    pub role: ParticipantRole,
    #[serde(default)]
    pub display_name: String,
}

/// Events sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    ChatHistory(Vec<MessageDto>),
    NewMessage(MessageDto),
    MessagesRead(MessagesReadPayload),
    PeerReady(PeerReadyPayload),
    RoomHasPeers(RoomHasPeersPayload),
    IncomingCall(CallPayload),
    CallAccepted(CallPayload),
    Offer(RelayedOffer),
    Answer(RelayedAnswer),
    IceCandidate(RelayedIceCandidate),
    CallEnded(CallPayload),
    UserTyping(UserTypingPayload),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub connection_id: String,
}

/// A persisted chat message as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub appointment_id: String,
    pub sender_id: String,
    pub sender_role: ParticipantRole,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// RFC 3339 (UTC)
    pub created_at: String,
    pub is_read: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub appointment_id: String,
    pub reader_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerReadyPayload {
    pub appointment_id: String,
    pub role: ParticipantRole,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomHasPeersPayload {
    pub appointment_id: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallPayload {
    pub appointment_id: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedOffer {
    pub offer: Value,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedAnswer {
    pub answer: Value,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedIceCandidate {
    pub candidate: Value,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub appointment_id: String,
    pub role: ParticipantRole,
    pub display_name: String,
    pub is_typing: bool,
}
