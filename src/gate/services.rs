use crate::events::GateEvent;
use crate::gate::scheduler::IdleScheduler;
use crate::subsystem::SubsystemLoader;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Collaborators injected into a gate.
#[derive(Clone)]
pub struct GateServices {
    /// Decides when the load may run
    pub scheduler: Arc<dyn IdleScheduler>,
    /// Fetches and instantiates the heavy visual
    pub loader: Arc<dyn SubsystemLoader>,
    /// Lifecycle events go here
    pub events: broadcast::Sender<GateEvent>,
}

impl std::fmt::Debug for GateServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateServices")
            .field("scheduler", &self.scheduler.name())
            .field("loader", &"Arc<dyn SubsystemLoader>")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
