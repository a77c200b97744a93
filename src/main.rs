use std::path::PathBuf;

use clap::Parser;
use tilesync::client::{self, RoomEvent};
use tilesync::config::ClientConfig;
use tracing::{info, warn};
use uuid::Uuid;

/// Headless client: joins a room and logs what happens in it.
#[derive(Parser, Debug)]
#[command(name = "tilesync", about = "Collaborative tile map sync client")]
struct Cli {
    #[arg(long, env = "TILESYNC_SERVER_URL", default_value = "ws://127.0.0.1:3000/ws")]
    server_url: String,

    #[arg(long, env = "TILESYNC_ROOM", default_value = "lobby")]
    room: String,

    /// Defaults to a fresh random id.
    #[arg(long, env = "TILESYNC_USER_ID")]
    user_id: Option<String>,

    #[arg(long, env = "TILESYNC_NAME", default_value = "observer")]
    name: String,

    /// JSON file remembering the viewport per room.
    #[arg(long, env = "TILESYNC_VIEWPORT_FILE")]
    viewport_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let user_id = cli.user_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut config = ClientConfig::new(cli.server_url, cli.room, user_id, cli.name);
    config.viewport_path = cli.viewport_file;
    info!(server_url = %config.server_url, room_id = %config.room_id, user_id = %config.user_id, "tilesync starting");

    let mut handle = client::spawn(config);
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => log_event(&event),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!(error = %e, "client task failed");
    }
    info!("tilesync stopped");
}

fn log_event(event: &RoomEvent) {
    match event {
        RoomEvent::Status(status) => info!(?status, "connection"),
        RoomEvent::Authenticated { user_id } => info!(%user_id, "authenticated"),
        RoomEvent::Ready { room_id, tiles } => info!(%room_id, tiles, "room ready"),
        RoomEvent::RoleChanged { previous, role } => info!(?previous, %role, "role changed"),
        RoomEvent::RoleSetAccepted { target_user_id, role } => info!(%target_user_id, %role, "role set"),
        RoomEvent::RemoteEdit { user_id, tiles } => info!(?user_id, tiles, "remote edit"),
        RoomEvent::SoftLockConflict { user_ids } => info!(?user_ids, "painting near peers"),
        RoomEvent::Saving => info!("saving"),
        RoomEvent::Saved { ts } => info!(?ts, "saved"),
        RoomEvent::RoomLeft => info!("left room"),
        RoomEvent::Latency { rtt_ms } => info!(rtt_ms, "latency"),
        RoomEvent::RoomList(rooms) => info!(count = rooms.len(), "rooms listed"),
        RoomEvent::RoomCreated { room_id } => info!(%room_id, "room created"),
        RoomEvent::Error(e) => warn!(error = %e, "room error"),
    }
}
