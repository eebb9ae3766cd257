use std::sync::Arc;

use crate::auth::AuthManager;
use crate::bus::RealtimeBus;
use crate::config::Config;
use crate::dispatcher::MessageDispatcher;
use crate::projects::ProjectEventEmitter;
use crate::store::ThreadStore;

/// Application context containing shared dependencies
/// This reduces parameter passing and makes it easier to add new dependencies
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn ThreadStore>,
    pub bus: Arc<RealtimeBus>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub project_events: Arc<ProjectEventEmitter>,
    pub auth_manager: Arc<AuthManager>,
    pub config: Arc<Config>,
}

impl AppContext {
    pub fn new(store: Arc<dyn ThreadStore>, auth_manager: Arc<AuthManager>, config: Arc<Config>) -> Self {
        let bus = Arc::new(RealtimeBus::new());
        let dispatcher = Arc::new(MessageDispatcher::new(
            store.clone(),
            bus.clone(),
            &config.messaging,
        ));
        let project_events = Arc::new(ProjectEventEmitter::new(bus.clone()));

        Self {
            store,
            bus,
            dispatcher,
            project_events,
            auth_manager,
            config,
        }
    }
}
