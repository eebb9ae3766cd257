use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames a client sends over the realtime socket.
///
/// The first frame on every connection must be `connect`; anything else
/// before authentication rejects the handshake and closes the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Connect { token: String },
    JoinProject { project_id: Uuid },
    LeaveProject { project_id: Uuid },
    JoinThread { thread_id: Uuid },
    LeaveThread { thread_id: Uuid },
}

/// Control frames the server sends back. Realtime events travel as
/// `RealtimeEvent` payloads (`{"event": ..., "data": ...}`) alongside these.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Connected { user_id: Uuid },
    Joined { room: String },
    Left { room: String },
    Error { code: String, message: String },
}
