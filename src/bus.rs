use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::events::{RealtimeEvent, Room};
use crate::metrics;

pub type ConnectionId = Uuid;
pub type EventSender = mpsc::UnboundedSender<RealtimeEvent>;

#[derive(Default)]
struct BusState {
    /// room -> connection -> sender
    rooms: HashMap<Room, HashMap<ConnectionId, EventSender>>,
    /// connection -> rooms it joined (reverse index for disconnect)
    memberships: HashMap<ConnectionId, HashSet<Room>>,
    /// connection -> its sender, kept so later joins don't need to re-supply it
    senders: HashMap<ConnectionId, EventSender>,
}

impl BusState {
    fn join(&mut self, connection: ConnectionId, room: Room, tx: EventSender) {
        self.rooms.entry(room).or_default().insert(connection, tx);
        self.memberships.entry(connection).or_default().insert(room);
    }

    fn leave(&mut self, connection: ConnectionId, room: Room) {
        self.remove_from_room(connection, room);
        if let Some(rooms) = self.memberships.get_mut(&connection) {
            rooms.remove(&room);
        }
    }

    fn remove_from_room(&mut self, connection: ConnectionId, room: Room) {
        let emptied = match self.rooms.get_mut(&room) {
            Some(members) => {
                members.remove(&connection);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.rooms.remove(&room);
        }
    }
}

/// Concurrency-safe room registry and fan-out point.
///
/// All membership state lives behind one RwLock, so a join or leave can
/// never interleave with an in-progress emit in a way that loses or
/// duplicates delivery to other members: an emit sees each room either
/// before or after a membership change, never mid-change.
///
/// Joining a project or thread room is caller-claimed and not verified
/// against the caller's authority; room names act as capability tokens.
/// Authorization is enforced where messages are posted.
#[derive(Default)]
pub struct RealtimeBus {
    state: RwLock<BusState>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated connection and automatically join its own
    /// user room.
    pub async fn register(&self, connection: ConnectionId, user: Uuid, tx: EventSender) {
        let mut state = self.state.write().await;
        state.senders.insert(connection, tx.clone());
        state.join(connection, Room::User(user), tx);
    }

    /// Join an additional room. No-op for connections that never registered
    /// (i.e. never completed the handshake).
    pub async fn join(&self, connection: ConnectionId, room: Room) -> bool {
        let mut state = self.state.write().await;
        match state.senders.get(&connection).cloned() {
            Some(tx) => {
                state.join(connection, room, tx);
                true
            }
            None => false,
        }
    }

    pub async fn leave(&self, connection: ConnectionId, room: Room) {
        let mut state = self.state.write().await;
        state.leave(connection, room);
    }

    /// Remove the connection from every room. Called on socket close; there
    /// is no per-send cancellation, a disconnect simply stops future
    /// deliveries.
    pub async fn disconnect(&self, connection: ConnectionId) {
        let mut state = self.state.write().await;
        state.senders.remove(&connection);
        if let Some(rooms) = state.memberships.remove(&connection) {
            for room in rooms {
                state.remove_from_room(connection, room);
            }
        }
    }

    /// Best-effort fan-out of `event` to every connection currently joined
    /// to `room`. No queuing, no retry, no acknowledgment; a closed channel
    /// is skipped. Returns the number of connections the event was handed
    /// to.
    pub async fn emit(&self, room: Room, event: RealtimeEvent) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(&room) else {
            tracing::trace!(room = %room, event = event.name(), "Emit to empty room");
            return 0;
        };

        let mut delivered = 0;
        for tx in members.values() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }

        metrics::EVENTS_EMITTED_TOTAL.inc();
        tracing::debug!(
            room = %room,
            event = event.name(),
            delivered = delivered,
            "Event emitted"
        );

        delivered
    }

    /// Number of connections currently joined to a room.
    pub async fn room_size(&self, room: Room) -> usize {
        let state = self.state.read().await;
        state.rooms.get(&room).map(|m| m.len()).unwrap_or(0)
    }
}
