//! WebSocket signaling endpoint.
//!
//! `GET /ws` upgrades to a signaling connection. Each connection gets:
//!
//! - a fresh connection id (also the participant id once joined),
//! - a writer task draining the session's event channel onto the socket,
//! - a read loop feeding inbound messages to the `SessionHandler` strictly
//!   in arrival order.
//!
//! Socket closure (or a read error) runs the same teardown as an explicit
//! `leave-room`.

use crate::registry::RoomRegistry;
use crate::session::SessionHandler;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use huddle_protocol::{ClientMessage, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

async fn ws_upgrade(
    State(registry): State<Arc<RoomRegistry>>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<RoomRegistry>) {
    let connection_id = Uuid::new_v4().to_string();
    debug!(
        target: "huddle.ws",
        connection_id = %connection_id,
        "Signaling connection established"
    );

    let (mut sink, mut stream) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: serialize events in channel order onto the socket.
    let writer_connection_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        target: "huddle.ws",
                        connection_id = %writer_connection_id,
                        error = %error,
                        "Failed to serialize outbound event"
                    );
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut session = SessionHandler::new(connection_id.clone(), registry, events_tx);

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => session.handle(message).await,
                Err(error) => {
                    // Unknown or malformed messages are dropped, not fatal.
                    warn!(
                        target: "huddle.ws",
                        connection_id = %connection_id,
                        error = %error,
                        "Ignoring unparseable signaling message"
                    );
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            // Pings are answered by axum; binary frames are not part of the
            // protocol.
            Ok(_) => {}
        }
    }

    session.disconnected().await;
    writer.abort();
    debug!(
        target: "huddle.ws",
        connection_id = %connection_id,
        "Signaling connection torn down"
    );
}

/// WebSocket route, to be merged into the server's root router.
pub fn ws_router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(registry)
}
