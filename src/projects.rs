use std::sync::Arc;
use uuid::Uuid;

use crate::bus::RealtimeBus;
use crate::events::{ProjectSummary, ProjectUpdate, RealtimeEvent, Room};

/// Forwards project lifecycle changes into the realtime room topology.
///
/// The project records themselves are owned by the portal's CRUD side; this
/// emitter only turns completed mutations into events on the same delivery
/// path message events use. Callers invoke it after the project write has
/// been durably applied.
pub struct ProjectEventEmitter {
    bus: Arc<RealtimeBus>,
}

impl ProjectEventEmitter {
    pub fn new(bus: Arc<RealtimeBus>) -> Self {
        Self { bus }
    }

    async fn emit_to_project_audience(
        &self,
        client_id: Uuid,
        project_id: Uuid,
        event: RealtimeEvent,
    ) {
        self.bus.emit(Room::User(client_id), event.clone()).await;
        self.bus.emit(Room::Project(project_id), event).await;
    }

    pub async fn project_created(&self, project: ProjectSummary) {
        let (client_id, project_id) = (project.client_id, project.id);
        self.emit_to_project_audience(
            client_id,
            project_id,
            RealtimeEvent::ProjectCreated { project },
        )
        .await;
    }

    pub async fn project_updated(&self, project: ProjectSummary) {
        let (client_id, project_id) = (project.client_id, project.id);
        self.emit_to_project_audience(
            client_id,
            project_id,
            RealtimeEvent::ProjectUpdated { project },
        )
        .await;
    }

    pub async fn progress_updated(&self, client_id: Uuid, project_id: Uuid, progress: u8) {
        self.emit_to_project_audience(
            client_id,
            project_id,
            RealtimeEvent::ProjectProgressUpdated {
                project_id,
                progress,
            },
        )
        .await;
    }

    /// Publish a posted project update. Admin-authored updates additionally
    /// reach the admin broadcast room under their own event name.
    pub async fn update_added(
        &self,
        client_id: Uuid,
        update: ProjectUpdate,
        authored_by_admin: bool,
    ) {
        let project_id = update.project_id;
        self.emit_to_project_audience(
            client_id,
            project_id,
            RealtimeEvent::ProjectUpdateAdded {
                project_id,
                update: update.clone(),
            },
        )
        .await;

        if authored_by_admin {
            self.bus
                .emit(
                    Room::AdminBroadcast,
                    RealtimeEvent::AdminProjectUpdate { project_id, update },
                )
                .await;
        }
    }
}
