//! HTTP and WebSocket transport.
//!
//! `GET /ws` upgrades to the game channel: each text frame carries one JSON
//! message (see [`crate::protocol`]). `GET /rooms` lists live rooms and
//! `GET /health` answers `ok`.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::{Flow, RoomManager, RoomSettings};
use axum::body::Body;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::Request;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tracing::{debug, info, instrument, warn};

/// Builds the application router around a room manager.
#[instrument(skip(manager))]
pub fn router(manager: RoomManager) -> Router {
    Router::new()
        .route("/ws", get(upgrade))
        .route("/rooms", get(list_rooms))
        .route("/health", get(health))
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            debug!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
        .with_state(manager)
}

/// Binds the listener and serves until Ctrl+C.
#[instrument(skip(config), fields(addr = %config.listen_addr()))]
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let manager = RoomManager::new(RoomSettings::from(&config));
    let app = router(manager);

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    info!(addr = %listener.local_addr()?, "Server ready, game channel at /ws");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn health() -> &'static str {
    "ok"
}

async fn list_rooms(State(manager): State<RoomManager>) -> impl IntoResponse {
    Json(manager.rooms())
}

async fn upgrade(ws: WebSocketUpgrade, State(manager): State<RoomManager>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

/// Drives one client connection until it closes.
///
/// Outbound messages are queued by the room manager and written by a
/// dedicated task, so room handling never waits on the network.
async fn handle_socket(socket: WebSocket, manager: RoomManager) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerMessage>();
    let conn = manager.connect(outbox);

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let closing = message == ServerMessage::GameFull;
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(error) => {
                    warn!(%conn, %error, "Failed to encode message");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
            if closing {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(message) => {
                    if manager.handle(conn, message) == Flow::Close {
                        break;
                    }
                }
                Err(error) => warn!(%conn, %error, "Unreadable client message"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(%conn, %error, "Socket error");
                break;
            }
        }
    }

    manager.disconnect(conn);
    if let Err(error) = writer.await {
        debug!(%conn, %error, "Writer task ended abnormally");
    }
}
