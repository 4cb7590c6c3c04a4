//! UseCase layer
//!
//! ドメインの Registry / Presence / Message Store を組み合わせて
//! シグナリングとチャットのユースケースを実装します。

pub mod error;
pub mod get_consultation_messages;
pub mod get_rooms;
pub mod hub;
mod room_worker;

pub use error::{GetConsultationMessagesError, GetRoomDetailError, HubError};
pub use get_consultation_messages::GetConsultationMessagesUseCase;
pub use get_rooms::{GetRoomDetailUseCase, GetRoomsUseCase};
pub use hub::{HubHandle, MemberSnapshot, RoomSnapshot, SignalingHub};
