//! UseCase: Room 一覧・詳細の取得
//!
//! Room は揮発的な状態なので、Hub のスナップショットから取得します。

use crate::domain::RoomId;

use super::{
    error::{GetRoomDetailError, HubError},
    hub::{HubHandle, RoomSnapshot},
};

/// Room 一覧取得のユースケース
pub struct GetRoomsUseCase {
    hub: HubHandle,
}

impl GetRoomsUseCase {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    /// 現在アクティブな全ての Room（Room ID 順）
    pub async fn execute(&self) -> Result<Vec<RoomSnapshot>, HubError> {
        self.hub.snapshot().await
    }
}

/// Room 詳細取得のユースケース
pub struct GetRoomDetailUseCase {
    hub: HubHandle,
}

impl GetRoomDetailUseCase {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }

    pub async fn execute(&self, room_id: String) -> Result<RoomSnapshot, GetRoomDetailError> {
        let room_id = RoomId::new(room_id).map_err(|_| GetRoomDetailError::RoomNotFound)?;
        self.hub
            .snapshot()
            .await
            .map_err(|_| GetRoomDetailError::HubUnavailable)?
            .into_iter()
            .find(|room| room.room_id == room_id)
            .ok_or(GetRoomDetailError::RoomNotFound)
    }
}
