mod connection;

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::context::AppContext;
use crate::events::Room;
use crate::metrics;
use crate::protocol::{ClientFrame, ServerFrame};
use connection::ConnectionHandler;
pub use connection::WebSocketStreamType;

/// Drives one realtime connection from accept to close.
///
/// The first frame must authenticate the connection; a failed handshake is
/// rejected before any room state exists. After that the connection sits in
/// its own user room, may claim project/thread rooms, and receives every
/// event emitted to a room it joined.
pub async fn handle_websocket(ws_stream: WebSocketStreamType, addr: SocketAddr, ctx: AppContext) {
    metrics::CONNECTIONS_TOTAL.inc();
    tracing::info!("New connection from: {}", addr);

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let mut handler = ConnectionHandler::new(ws_sender, addr);

    let Some(principal) = await_handshake(&mut handler, &mut ws_receiver, &ctx).await else {
        tracing::info!("Handshake rejected for {}", addr);
        return;
    };
    handler.set_principal(principal);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection_id = Uuid::new_v4();
    ctx.bus.register(connection_id, principal.id, tx).await;
    if principal.role == Role::Admin {
        ctx.bus.join(connection_id, Room::AdminBroadcast).await;
    }

    if handler
        .send_frame(&ServerFrame::Connected {
            user_id: principal.id,
        })
        .await
        .is_err()
    {
        ctx.bus.disconnect(connection_id).await;
        return;
    }

    loop {
        tokio::select! {
            Some(msg) = ws_receiver.next() => {
                match msg {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                handle_client_frame(&mut handler, &ctx, connection_id, frame).await;
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse frame from {}: {}", addr, e);
                                handler.send_error("INVALID_FORMAT", "Invalid frame format").await;
                            }
                        }
                    }
                    Ok(WsMessage::Close(_)) => {
                        tracing::info!("Connection closed by client: {}", addr);
                        break;
                    }
                    Ok(WsMessage::Ping(data)) => {
                        let _ = handler.ws_sender_mut().send(WsMessage::Pong(data)).await;
                    }
                    Err(e) => {
                        tracing::warn!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    _ => {}
                }
            }

            Some(event) = rx.recv() => {
                if handler.send_event(&event).await.is_err() {
                    break;
                }
            }
        }
    }

    ctx.bus.disconnect(connection_id).await;
    tracing::info!("Connection closed: {}", addr);
}

/// Waits for the `connect` frame and verifies its token. Returns `None` when
/// the handshake is rejected; no bus state has been created at that point.
async fn await_handshake(
    handler: &mut ConnectionHandler,
    ws_receiver: &mut futures_util::stream::SplitStream<WebSocketStreamType>,
    ctx: &AppContext,
) -> Option<Principal> {
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                return match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Connect { token }) => {
                        match ctx.auth_manager.authenticate(&token) {
                            Ok(principal) => Some(principal),
                            Err(e) => {
                                tracing::warn!(error = %e, "Realtime authentication failed");
                                handler
                                    .send_error("HANDSHAKE_REJECTED", "Authentication failed")
                                    .await;
                                None
                            }
                        }
                    }
                    _ => {
                        handler
                            .send_error(
                                "HANDSHAKE_REQUIRED",
                                "The first frame must be a connect frame",
                            )
                            .await;
                        None
                    }
                };
            }
            Ok(WsMessage::Ping(data)) => {
                let _ = handler.ws_sender_mut().send(WsMessage::Pong(data)).await;
            }
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

/// Room membership is caller-claimed: the bus hands out project and thread
/// rooms without checking the claim, room names acting as capability tokens.
/// Write authorization happens in the dispatcher and HTTP routes.
async fn handle_client_frame(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    connection_id: Uuid,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Connect { .. } => {
            handler
                .send_error("ALREADY_CONNECTED", "Connection is already authenticated")
                .await;
        }
        ClientFrame::JoinProject { project_id } => {
            join_room(handler, ctx, connection_id, Room::Project(project_id)).await;
        }
        ClientFrame::LeaveProject { project_id } => {
            leave_room(handler, ctx, connection_id, Room::Project(project_id)).await;
        }
        ClientFrame::JoinThread { thread_id } => {
            join_room(handler, ctx, connection_id, Room::Thread(thread_id)).await;
        }
        ClientFrame::LeaveThread { thread_id } => {
            leave_room(handler, ctx, connection_id, Room::Thread(thread_id)).await;
        }
    }
}

async fn join_room(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    connection_id: Uuid,
    room: Room,
) {
    if ctx.bus.join(connection_id, room).await {
        let _ = handler
            .send_frame(&ServerFrame::Joined {
                room: room.to_string(),
            })
            .await;
    } else {
        handler
            .send_error("NOT_CONNECTED", "Connection is not registered")
            .await;
    }
}

async fn leave_room(
    handler: &mut ConnectionHandler,
    ctx: &AppContext,
    connection_id: Uuid,
    room: Room,
) {
    ctx.bus.leave(connection_id, room).await;
    let _ = handler
        .send_frame(&ServerFrame::Left {
            room: room.to_string(),
        })
        .await;
}
