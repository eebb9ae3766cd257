use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::model::Message;

/// A named fan-out group. Connections join rooms; events are emitted to
/// rooms. Three id-keyed namespaces plus one broadcast room for admin
/// audiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    User(Uuid),
    Project(Uuid),
    Thread(Uuid),
    AdminBroadcast,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{}", id),
            Room::Project(id) => write!(f, "project:{}", id),
            Room::Thread(id) => write!(f, "thread:{}", id),
            Room::AdminBroadcast => write!(f, "admin:broadcast"),
        }
    }
}

/// Summary of a project as carried by lifecycle events. The project record
/// itself is owned by the portal's CRUD side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    /// Completion percentage, 0..=100.
    pub progress: u8,
}

/// A progress/status note posted on a project timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub id: Uuid,
    pub project_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
}

/// The closed set of events delivered over the realtime bus. One variant per
/// wire event name; each carries a statically defined payload.
///
/// Serialized as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RealtimeEvent {
    /// New message in a thread; delivered to `thread:{id}`.
    MessageReceived { thread_id: Uuid, message: Message },
    /// New message in a project-scoped thread; delivered to `project:{id}`.
    ProjectMessage {
        project_id: Uuid,
        thread_id: Uuid,
        message: Message,
    },
    /// Personal notification for the recipient; delivered to `user:{id}`.
    Notification {
        thread_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        subject: String,
    },
    ProjectCreated { project: ProjectSummary },
    ProjectUpdated { project: ProjectSummary },
    ProjectProgressUpdated { project_id: Uuid, progress: u8 },
    ProjectUpdateAdded {
        project_id: Uuid,
        update: ProjectUpdate,
    },
    /// Admin-audience copy of an admin-authored project update; delivered to
    /// the admin broadcast room.
    AdminProjectUpdate {
        project_id: Uuid,
        update: ProjectUpdate,
    },
}

impl RealtimeEvent {
    /// The wire name of this event, as used in the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::MessageReceived { .. } => "message-received",
            RealtimeEvent::ProjectMessage { .. } => "project-message",
            RealtimeEvent::Notification { .. } => "notification",
            RealtimeEvent::ProjectCreated { .. } => "project-created",
            RealtimeEvent::ProjectUpdated { .. } => "project-updated",
            RealtimeEvent::ProjectProgressUpdated { .. } => "project-progress-updated",
            RealtimeEvent::ProjectUpdateAdded { .. } => "project-update-added",
            RealtimeEvent::AdminProjectUpdate { .. } => "admin-project-update",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_follow_taxonomy() {
        let id = Uuid::nil();
        assert_eq!(
            Room::User(id).to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
        assert!(Room::Project(id).to_string().starts_with("project:"));
        assert!(Room::Thread(id).to_string().starts_with("thread:"));
        assert_eq!(Room::AdminBroadcast.to_string(), "admin:broadcast");
    }

    #[test]
    fn event_tag_matches_name() {
        let event = RealtimeEvent::ProjectProgressUpdated {
            project_id: Uuid::new_v4(),
            progress: 40,
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["progress"], 40);
    }
}
