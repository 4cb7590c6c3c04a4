//! Consultation relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin carelink-server -- --appointment apt-1:patient-1:doctor-1
//! cargo run --bin carelink-server -- --host 0.0.0.0 --port 3000 --database-url sqlite://carelink.db
//! ```

use std::sync::Arc;

use carelink_server::{
    domain::{Appointment, AppointmentDirectory, MessageStore, RoomId, UserId},
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryAppointmentDirectory, InMemoryMessageStore, SqliteMessageStore},
    },
    ui::Server,
    usecase::{GetConsultationMessagesUseCase, SignalingHub},
};
use carelink_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "carelink-server")]
#[command(about = "Consultation chat relay and WebRTC signaling server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// SQLite database URL (e.g. `sqlite://carelink.db`); messages are kept in memory when omitted
    #[arg(long, env = "CARELINK_DATABASE_URL")]
    database_url: Option<String>,

    /// Appointment to accept, as `<appointmentId>:<patientId>:<doctorId>` (repeatable)
    #[arg(short = 'a', long = "appointment", value_parser = parse_appointment)]
    appointments: Vec<Appointment>,

    /// Default log level (overridden by `RUST_LOG`)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_appointment(value: &str) -> Result<Appointment, String> {
    let mut parts = value.splitn(3, ':');
    let (Some(id), Some(patient), Some(doctor)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!(
            "expected <appointmentId>:<patientId>:<doctorId>, got '{value}'"
        ));
    };

    Ok(Appointment::new(
        RoomId::new(id.to_string()).map_err(|e| e.to_string())?,
        UserId::new(patient.to_string()).map_err(|e| e.to_string())?,
        UserId::new(doctor.to_string()).map_err(|e| e.to_string())?,
    ))
}

async fn build_stores(
    args: &Args,
) -> Result<(Arc<dyn MessageStore>, Arc<dyn AppointmentDirectory>), Box<dyn std::error::Error>> {
    match &args.database_url {
        Some(url) => {
            let store = Arc::new(SqliteMessageStore::connect(url).await?);
            for appointment in &args.appointments {
                store.upsert_appointment(appointment).await?;
            }
            tracing::info!("Using SQLite message store at {}", url);
            let message_store: Arc<dyn MessageStore> = store.clone();
            let directory: Arc<dyn AppointmentDirectory> = store;
            Ok((message_store, directory))
        }
        None => {
            tracing::info!(
                "Using in-memory message store with {} appointment(s)",
                args.appointments.len()
            );
            let message_store: Arc<dyn MessageStore> = Arc::new(InMemoryMessageStore::default());
            let directory: Arc<dyn AppointmentDirectory> =
                Arc::new(InMemoryAppointmentDirectory::new(args.appointments.clone()));
            Ok((message_store, directory))
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(&["carelink_server", "tower_http"], &args.log_level);

    // Initialize dependencies in order:
    // 1. Message Store / Appointment Directory
    // 2. MessagePusher
    // 3. Signaling Hub
    // 4. UseCases
    // 5. Server

    // 1. Create stores
    let (store, appointments) = match build_stores(&args).await {
        Ok(stores) => stores,
        Err(e) => {
            tracing::error!("Failed to open message store: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::default());

    // 3. Start the hub
    let (hub, _hub_task) = SignalingHub::spawn(store.clone(), appointments, message_pusher);

    // 4. Create UseCases
    let get_consultation_messages_usecase = Arc::new(GetConsultationMessagesUseCase::new(store));

    // 5. Create and run the server
    let server = Server::new(hub, get_consultation_messages_usecase);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
