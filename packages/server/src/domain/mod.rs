//! Domain layer for the consultation relay.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and infrastructure concerns.

pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod presence;
pub mod registry;
pub mod repository;
pub mod value_object;

pub use entity::{Appointment, ChatMessage, Consultation, Identity, NewMessage};
pub use error::{MessagePushError, StoreError, ValueObjectError};
pub use event::{Destination, InboundEvent, OutboundEvent, SignalKind};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use presence::{PresenceTracker, RoomPresence};
pub use registry::RoomRegistry;
pub use repository::{AppointmentDirectory, MessageStore};
pub use value_object::{
    ConnectionId, ConnectionIdFactory, MessageContent, MessageId, MessageIdFactory, MessageKind,
    ParticipantRole, RoomId, SignalPayload, Timestamp, UserId,
};

#[cfg(test)]
pub use repository::{MockAppointmentDirectory, MockMessageStore};
