//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use carelink_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::RoomId,
    infrastructure::dto::http::{ConsultationMessagesDto, MemberDto, RoomSummaryDto},
    ui::state::AppState,
    usecase::{GetConsultationMessagesError, GetRoomDetailError, RoomSnapshot},
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

// Domain Model から DTO への変換
fn to_summary(room: RoomSnapshot) -> RoomSummaryDto {
    RoomSummaryDto {
        appointment_id: room.room_id.into_string(),
        members: room
            .members
            .into_iter()
            .map(|member| MemberDto {
                connection_id: member.connection_id.into_string(),
                user_id: member.user_id.map(|id| id.into_string()),
                role: member.role,
            })
            .collect(),
        typing: room.typing,
        ready: room.ready,
    }
}

/// Get list of active rooms
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomSummaryDto>>, StatusCode> {
    match state.get_rooms_usecase.execute().await {
        Ok(rooms) => Ok(Json(rooms.into_iter().map(to_summary).collect())),
        Err(e) => {
            tracing::error!("Failed to get rooms: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Get room detail by appointment ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<RoomSummaryDto>, StatusCode> {
    match state.get_room_detail_usecase.execute(appointment_id).await {
        Ok(room) => Ok(Json(to_summary(room))),
        Err(GetRoomDetailError::RoomNotFound) => Err(StatusCode::NOT_FOUND),
        Err(GetRoomDetailError::HubUnavailable) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

/// Get the persisted chat history of a consultation
pub async fn get_consultation_messages(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<ConsultationMessagesDto>, StatusCode> {
    let room_id = RoomId::new(appointment_id).map_err(|_| StatusCode::NOT_FOUND)?;

    match state.get_consultation_messages_usecase.execute(room_id).await {
        Ok((consultation, messages)) => Ok(Json(ConsultationMessagesDto {
            appointment_id: consultation.room_id.into_string(),
            patient_id: consultation.patient_id.into_string(),
            doctor_id: consultation.doctor_id.into_string(),
            created_at: timestamp_to_rfc3339(consultation.created_at.value()),
            messages: messages.into_iter().map(Into::into).collect(),
        })),
        Err(GetConsultationMessagesError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(GetConsultationMessagesError::StoreUnavailable(e)) => {
            tracing::error!("Failed to load consultation messages: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
