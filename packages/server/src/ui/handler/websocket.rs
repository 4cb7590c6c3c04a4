//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, ConnectionIdFactory, Identity, InboundEvent, ParticipantRole, UserId},
    infrastructure::dto::websocket::ClientEvent,
    ui::state::AppState,
};

/// Query parameters for WebSocket connection
///
/// Both fields are supplied by the session provider. When they are absent the
/// connection is anonymous and room membership is not checked against the
/// appointment's participants.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    pub user_id: Option<String>,
    pub role: Option<ParticipantRole>,
}

impl ConnectQuery {
    fn identity(self) -> Result<Option<Identity>, StatusCode> {
        match (self.user_id, self.role) {
            (None, None) => Ok(None),
            (Some(user_id), Some(role)) => {
                let user_id = UserId::new(user_id).map_err(|e| {
                    tracing::warn!("Invalid userId: {}", e);
                    StatusCode::BAD_REQUEST
                })?;
                Ok(Some(Identity { user_id, role }))
            }
            _ => {
                tracing::warn!("userId and role must be given together");
                Err(StatusCode::BAD_REQUEST)
            }
        }
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let identity = query.identity()?;
    let connection_id = ConnectionIdFactory::generate();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, connection_id, identity)))
}

/// Decodes one text frame into a hub event.
///
/// Returns the reason on failure; it is reported back to the sender as an
/// `error` event.
fn parse_frame(text: &str) -> Result<InboundEvent, String> {
    let event: ClientEvent = serde_json::from_str(text).map_err(|e| e.to_string())?;
    InboundEvent::try_from(event).map_err(|e| e.to_string())
}

/// Spawns a task that receives frames from the rx channel and pushes them to the WebSocket sender.
///
/// # Arguments
///
/// * `rx` - Channel receiver for serialized events addressed to this connection
/// * `sender` - WebSocket sink of this connection
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    connection_id: ConnectionId,
    identity: Option<Identity>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = state.hub.connect(connection_id.clone(), identity, tx) {
        tracing::error!("Failed to register connection '{}': {}", connection_id, e);
        return;
    }

    let (sender, mut receiver) = socket.split();

    let hub = state.hub.clone();
    let id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", id, e);
                    break;
                }
            };

            let delivered = match msg {
                Message::Text(text) => {
                    tracing::trace!("Received frame from '{}': {}", id, text.as_str());
                    match parse_frame(text.as_str()) {
                        Ok(event) => hub.dispatch(id.clone(), event),
                        Err(reason) => hub.reject(id.clone(), reason),
                    }
                }
                Message::Binary(_) => hub.reject(id.clone(), "binary frames are not supported"),
                Message::Close(_) => {
                    tracing::debug!("Connection '{}' requested close", id);
                    break;
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => Ok(()),
            };

            if let Err(e) = delivered {
                tracing::error!("Dropping frame from '{}': {}", id, e);
                break;
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    if let Err(e) = state.hub.disconnect(connection_id.clone()) {
        tracing::warn!("Failed to report disconnect of '{}': {}", connection_id, e);
    }
}
