use super::{Engine, EngineState};
use crate::services::ServiceRegistry;
use crate::shutdown::{ShutdownCoordinator, ShutdownReport};
use std::sync::Arc;
use tracing::{debug, warn};

impl Engine {
    /// Record a state transition. Nothing leaves Terminated.
    pub(super) fn set_state(&mut self, state: EngineState) {
        if self.state.is_terminal() {
            warn!("Ignoring transition to {} after termination", state);
            return;
        }
        debug!("Engine state changed: {} -> {}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.state.is_terminal()
    }

    /// Every state entered so far, starting with the initial Stopped
    pub fn transitions(&self) -> &[EngineState] {
        &self.transitions
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Report from the coordinated shutdown, once it has happened
    pub fn last_shutdown_report(&self) -> Option<&ShutdownReport> {
        self.last_shutdown.as_ref()
    }
}
