//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::usecase::{
    GetConsultationMessagesUseCase, GetRoomDetailUseCase, GetRoomsUseCase, HubHandle,
};

use super::{
    handler::{
        get_consultation_messages, get_room_detail, get_rooms, health_check, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Consultation relay server
///
/// # Example
///
/// ```ignore
/// let (hub, _hub_task) = SignalingHub::spawn(store.clone(), directory, pusher);
/// let server = Server::new(hub, store);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    hub: HubHandle,
    get_rooms_usecase: Arc<GetRoomsUseCase>,
    get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    get_consultation_messages_usecase: Arc<GetConsultationMessagesUseCase>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `hub` - Handle of the running signaling hub
    /// * `get_consultation_messages_usecase` - UseCase for reading persisted history
    pub fn new(
        hub: HubHandle,
        get_consultation_messages_usecase: Arc<GetConsultationMessagesUseCase>,
    ) -> Self {
        Self {
            get_rooms_usecase: Arc::new(GetRoomsUseCase::new(hub.clone())),
            get_room_detail_usecase: Arc::new(GetRoomDetailUseCase::new(hub.clone())),
            get_consultation_messages_usecase,
            hub,
        }
    }

    /// Build the router with all endpoints
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            hub: self.hub,
            get_rooms_usecase: self.get_rooms_usecase,
            get_room_detail_usecase: self.get_room_detail_usecase,
            get_consultation_messages_usecase: self.get_consultation_messages_usecase,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/rooms", get(get_rooms))
            .route("/api/rooms/{appointment_id}", get(get_room_detail))
            .route(
                "/api/consultations/{appointment_id}/messages",
                get(get_consultation_messages),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Run the relay server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Consultation relay listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
