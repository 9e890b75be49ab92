// Path: crates/bridge-supervisor/src/lifecycle.rs
//! The supervisor's lifecycle state machine:
//! `Uninitialized → Initialized → Running ⇄ Stopped → ShutDown`.

/// A state in the supervisor's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No setup has run yet.
    Uninitialized,
    /// Setup completed; components have not been started.
    Initialized,
    /// Components are running and the health loop is active.
    Running,
    /// Components have been stopped but the supervisor can still restart them.
    Stopped,
    /// Terminal state; the supervisor cannot be reused after this.
    ShutDown,
}

impl LifecycleState {
    /// A stable display name for error messages and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::ShutDown => "shut_down",
        }
    }

    /// Whether `initialize()` may run from this state.
    pub fn can_initialize(self) -> bool {
        matches!(self, Self::Uninitialized)
    }

    /// Whether `start()` may run from this state.
    pub fn can_start(self) -> bool {
        matches!(self, Self::Initialized | Self::Stopped)
    }

    /// Whether `stop()` may run from this state.
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether `shutdown()` may run from this state.
    pub fn can_shutdown(self) -> bool {
        matches!(self, Self::Running | Self::Stopped | Self::Initialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_can_stop_or_shutdown_but_not_initialize_or_start() {
        let state = LifecycleState::Running;
        assert!(!state.can_initialize());
        assert!(!state.can_start());
        assert!(state.can_stop());
        assert!(state.can_shutdown());
    }

    #[test]
    fn stopped_can_restart_or_shutdown() {
        let state = LifecycleState::Stopped;
        assert!(state.can_start());
        assert!(state.can_shutdown());
        assert!(!state.can_stop());
    }

    #[test]
    fn shut_down_is_terminal() {
        let state = LifecycleState::ShutDown;
        assert!(!state.can_initialize());
        assert!(!state.can_start());
        assert!(!state.can_stop());
        assert!(!state.can_shutdown());
    }
}
