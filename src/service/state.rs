// ============================================================================
// Service State Management
// ============================================================================
//
// The distributor runs as a supervised service:
//
//   Idle ──> Starting ──> Running ──> Stopping ──> Stopped
//               │                        │
//               └──────> Failed <────────┘
//
// ============================================================================

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, nothing started yet
    Idle,

    /// Bringing up dependent subservices
    Starting,

    /// Accepting requests
    Running,

    /// Draining in-flight requests, then tearing down subservices
    Stopping,

    /// Terminated cleanly
    Stopped,

    /// Terminated because a subservice failed
    Failed,
}

impl ServiceState {
    /// Check if the service has terminated
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped | ServiceState::Failed)
    }

    /// Check if new requests may be admitted
    pub fn accepts_requests(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Guarded transitions of the lifecycle
    pub fn can_transition_to(&self, next: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Idle => "Idle",
            ServiceState::Starting => "Starting",
            ServiceState::Running => "Running",
            ServiceState::Stopping => "Stopping",
            ServiceState::Stopped => "Stopped",
            ServiceState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        let path = [
            ServiceState::Idle,
            ServiceState::Starting,
            ServiceState::Running,
            ServiceState::Stopping,
            ServiceState::Stopped,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [ServiceState::Stopped, ServiceState::Failed] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(ServiceState::Starting));
            assert!(!terminal.can_transition_to(ServiceState::Running));
        }
    }

    #[test]
    fn running_cannot_skip_the_drain() {
        assert!(!ServiceState::Running.can_transition_to(ServiceState::Stopped));
        assert!(!ServiceState::Idle.can_transition_to(ServiceState::Running));
    }
}
