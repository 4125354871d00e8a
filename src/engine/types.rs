use std::fmt;

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Terminated,
}

impl EngineState {
    /// Terminated is absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Terminated)
    }

    /// A lifecycle operation is midway through
    pub fn is_transitional(&self) -> bool {
        matches!(self, EngineState::Starting | EngineState::Stopping)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Stopped => "stopped",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
            EngineState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
