//! Conversion logic between DTOs and domain models.

use carelink_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    ChatMessage, ConnectionId, Destination, InboundEvent, MessageContent, OutboundEvent, RoomId,
    SignalKind, SignalPayload, UserId, ValueObjectError,
};
use crate::infrastructure::dto::websocket as dto;

// ========================================
// DTO → Domain
// ========================================

fn room_id(value: String) -> Result<RoomId, ValueObjectError> {
    RoomId::new(value)
}

/// `to` が指定されていれば特定の接続、なければ Room 宛て
fn destination(
    appointment_id: Option<String>,
    to: Option<String>,
) -> Result<Destination, ValueObjectError> {
    match (to, appointment_id) {
        (Some(to), _) => Ok(Destination::ToConnection(ConnectionId::new(to)?)),
        (None, Some(appointment_id)) => Ok(Destination::ToRoom(room_id(appointment_id)?)),
        (None, None) => Err(ValueObjectError::Missing("appointmentId or to")),
    }
}

impl TryFrom<dto::ClientEvent> for InboundEvent {
    type Error = ValueObjectError;

    fn try_from(event: dto::ClientEvent) -> Result<Self, Self::Error> {
        use dto::ClientEvent as E;

        Ok(match event {
            E::JoinRoom(r) => Self::JoinRoom {
                room_id: room_id(r.appointment_id)?,
            },
            E::SendMessage(p) => Self::SendMessage {
                room_id: room_id(p.appointment_id)?,
                sender_id: UserId::new(p.sender_id)?,
                sender_role: p.sender_role,
                content: MessageContent::new(p.message)?,
                kind: p.kind,
            },
            E::MarkMessagesRead(p) => Self::MarkRead {
                room_id: room_id(p.appointment_id)?,
                reader_id: UserId::new(p.user_id)?,
            },
            E::UserReady(p) => Self::Ready {
                room_id: room_id(p.appointment_id)?,
                role: p.role,
            },
            E::CheckRoom(r) => Self::CheckRoom {
                room_id: room_id(r.appointment_id)?,
            },
            E::StartVideoCall(r) => Self::StartCall {
                room_id: room_id(r.appointment_id)?,
            },
            E::AcceptCall(p) => Self::AcceptCall {
                target: ConnectionId::new(p.to)?,
                room_id: room_id(p.appointment_id)?,
            },
            E::Offer(p) => Self::Signal {
                kind: SignalKind::Offer,
                destination: destination(p.appointment_id, p.to)?,
                payload: SignalPayload::new(p.offer),
            },
            E::Answer(p) => Self::Signal {
                kind: SignalKind::Answer,
                destination: destination(p.appointment_id, p.to)?,
                payload: SignalPayload::new(p.answer),
            },
            E::IceCandidate(p) => Self::Signal {
                kind: SignalKind::IceCandidate,
                destination: destination(p.appointment_id, p.to)?,
                payload: SignalPayload::new(p.candidate),
            },
            E::EndCall(r) => Self::EndCall {
                room_id: room_id(r.appointment_id)?,
            },
            E::TypingStart(p) => Self::Typing {
                room_id: room_id(p.appointment_id)?,
                role: p.role,
                display_name: p.display_name,
                is_typing: true,
            },
            E::TypingStop(p) => Self::Typing {
                room_id: room_id(p.appointment_id)?,
                role: p.role,
                display_name: p.display_name,
                is_typing: false,
            },
            E::LeaveAppointment(r) => Self::LeaveRoom {
                room_id: room_id(r.appointment_id)?,
            },
        })
    }
}

// ========================================
// Domain → DTO
// ========================================

impl From<ChatMessage> for dto::MessageDto {
    fn from(model: ChatMessage) -> Self {
        Self {
            id: model.id.into_string(),
            appointment_id: model.room_id.into_string(),
            sender_id: model.sender_id.into_string(),
            sender_role: model.sender_role,
            message: model.content.into_string(),
            kind: model.kind,
            created_at: timestamp_to_rfc3339(model.created_at.value()),
            is_read: model.is_read,
        }
    }
}

impl From<OutboundEvent> for dto::ServerEvent {
    fn from(event: OutboundEvent) -> Self {
        use OutboundEvent as O;

        match event {
            O::Connected { connection_id } => Self::Connected(dto::ConnectedPayload {
                connection_id: connection_id.into_string(),
            }),
            O::ChatHistory(messages) => {
                Self::ChatHistory(messages.into_iter().map(Into::into).collect())
            }
            O::NewMessage(message) => Self::NewMessage(message.into()),
            O::MessagesRead { room_id, reader_id } => {
                Self::MessagesRead(dto::MessagesReadPayload {
                    appointment_id: room_id.into_string(),
                    reader_id: reader_id.into_string(),
                })
            }
            O::PeerReady {
                room_id,
                role,
                from,
            } => Self::PeerReady(dto::PeerReadyPayload {
                appointment_id: room_id.into_string(),
                role,
                from: from.into_string(),
            }),
            O::RoomHasPeers { room_id, count } => Self::RoomHasPeers(dto::RoomHasPeersPayload {
                appointment_id: room_id.into_string(),
                count,
            }),
            O::IncomingCall { room_id, from } => Self::IncomingCall(dto::CallPayload {
                appointment_id: room_id.into_string(),
                from: from.into_string(),
            }),
            O::CallAccepted { room_id, from } => Self::CallAccepted(dto::CallPayload {
                appointment_id: room_id.into_string(),
                from: from.into_string(),
            }),
            O::Signal {
                kind,
                from,
                payload,
            } => {
                let from = from.into_string();
                match kind {
                    SignalKind::Offer => Self::Offer(dto::RelayedOffer {
                        offer: payload.into_value(),
                        from,
                    }),
                    SignalKind::Answer => Self::Answer(dto::RelayedAnswer {
                        answer: payload.into_value(),
                        from,
                    }),
                    SignalKind::IceCandidate => Self::IceCandidate(dto::RelayedIceCandidate {
                        candidate: payload.into_value(),
                        from,
                    }),
                }
            }
            O::CallEnded { room_id, from } => Self::CallEnded(dto::CallPayload {
                appointment_id: room_id.into_string(),
                from: from.into_string(),
            }),
            O::UserTyping {
                room_id,
                role,
                display_name,
                is_typing,
            } => Self::UserTyping(dto::UserTypingPayload {
                appointment_id: room_id.into_string(),
                role,
                display_name,
                is_typing,
            }),
            O::Error(reason) => Self::Error(reason),
        }
    }
}
