use futures_util::SinkExt;
use futures_util::stream::SplitSink;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::auth::Principal;
use crate::events::RealtimeEvent;
use crate::protocol::ServerFrame;

pub type WebSocketStreamType = WebSocketStream<TcpStream>;

/// Write half of a realtime connection plus its authenticated identity.
pub struct ConnectionHandler {
    ws_sender: SplitSink<WebSocketStreamType, WsMessage>,
    principal: Option<Principal>,
    addr: SocketAddr,
}

impl ConnectionHandler {
    pub fn new(ws_sender: SplitSink<WebSocketStreamType, WsMessage>, addr: SocketAddr) -> Self {
        Self {
            ws_sender,
            principal: None,
            addr,
        }
    }

    async fn send_json<T: Serialize>(&mut self, payload: &T) -> Result<(), String> {
        let json = serde_json::to_string(payload)
            .map_err(|e| format!("Failed to serialize frame: {}", e))?;

        self.ws_sender
            .send(WsMessage::Text(json))
            .await
            .map_err(|e| format!("Failed to send frame: {}", e))?;

        Ok(())
    }

    pub async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), String> {
        self.send_json(frame).await
    }

    pub async fn send_event(&mut self, event: &RealtimeEvent) -> Result<(), String> {
        self.send_json(event).await
    }

    pub async fn send_error(&mut self, code: &str, message: &str) {
        let frame = ServerFrame::Error {
            code: code.to_string(),
            message: message.to_string(),
        };
        if self.send_frame(&frame).await.is_err() {
            tracing::debug!("Failed to send error to disconnected client {}", self.addr);
        }
    }

    #[allow(dead_code)]
    pub fn principal(&self) -> Option<Principal> {
        self.principal
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn ws_sender_mut(&mut self) -> &mut SplitSink<WebSocketStreamType, WsMessage> {
        &mut self.ws_sender
    }
}
