//! Server state shared by all handlers.

use std::sync::Arc;

use crate::usecase::{
    GetConsultationMessagesUseCase, GetRoomDetailUseCase, GetRoomsUseCase, HubHandle,
};

/// Shared application state
pub struct AppState {
    /// Signaling Hub への送信口
    pub hub: HubHandle,
    /// GetRoomsUseCase（Room 一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（Room 詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    /// GetConsultationMessagesUseCase（診察メッセージ履歴取得のユースケース）
    pub get_consultation_messages_usecase: Arc<GetConsultationMessagesUseCase>,
}
