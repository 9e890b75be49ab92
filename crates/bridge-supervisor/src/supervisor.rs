// Path: crates/bridge-supervisor/src/supervisor.rs
//! The supervisor (C11): drives every managed sub-service through the
//! lifecycle state machine and runs a periodic health loop that aggregates
//! their health into a single [`HealthLevel`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use seda_bridge_retry::with_deadline;
use seda_bridge_types::config::SupervisorConfig;
use seda_bridge_types::error::SupervisorError;
use seda_bridge_types::events::{HealthLevel, SupervisorEvent};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::event_bus::EventBus;
use crate::lifecycle::LifecycleState;

/// A sub-service the supervisor drives through start/stop and polls for health.
///
/// Concrete services (the scheduler, tracker, push service, sequence validator)
/// have their own richer APIs; a thin adapter implementing this trait is what
/// the process binary (bridge-node) registers with the supervisor.
#[async_trait]
pub trait ManagedComponent: Send + Sync {
    /// A stable name used in logs and degraded-health event payloads.
    fn name(&self) -> &str;
    /// Starts the component's background work.
    async fn start(&self);
    /// Stops the component's background work.
    async fn stop(&self);
    /// Reports whether the component currently considers itself healthy.
    async fn health(&self) -> bool;
}

/// Drives the supervised components through the lifecycle state machine and
/// runs the periodic health loop (C11).
pub struct Supervisor {
    components: Vec<Arc<dyn ManagedComponent>>,
    config: SupervisorConfig,
    events: Arc<EventBus>,
    state: Mutex<LifecycleState>,
    health_shutdown: Mutex<Option<tokio::sync::watch::Sender<bool>>>,
}

impl Supervisor {
    /// Builds a supervisor over `components`, starting in `Uninitialized`.
    pub fn new(components: Vec<Arc<dyn ManagedComponent>>, config: SupervisorConfig, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            components,
            config,
            events,
            state: Mutex::new(LifecycleState::Uninitialized),
            health_shutdown: Mutex::new(None),
        })
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    fn emit(&self, event: SupervisorEvent) {
        let _ = self.events.supervisor_sender().send(event);
    }

    /// Transitions `Uninitialized → Initialized`. Idempotent: re-calling while
    /// already `Initialized` is a no-op that logs a warning.
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        if *state == LifecycleState::Initialized {
            warn!(target = "supervisor", "initialize() called while already initialized; no-op");
            return Ok(());
        }
        if !state.can_initialize() {
            return Err(SupervisorError::InvalidTransition { action: "initialize", state: state.label() });
        }
        *state = LifecycleState::Initialized;
        drop(state);
        info!(target = "supervisor", "initialized");
        self.emit(SupervisorEvent::Initialized);
        Ok(())
    }

    /// Transitions `Initialized|Stopped → Running`: starts every component and
    /// spawns the periodic health loop. Idempotent: re-calling while already
    /// `Running` is a no-op that logs a warning.
    pub async fn start(self: &Arc<Self>) -> Result<(), SupervisorError> {
        {
            let mut state = self.state.lock().await;
            if *state == LifecycleState::Running {
                warn!(target = "supervisor", "start() called while already running; no-op");
                return Ok(());
            }
            if !state.can_start() {
                return Err(SupervisorError::InvalidTransition { action: "start", state: state.label() });
            }
            *state = LifecycleState::Running;
        }

        for component in &self.components {
            component.start().await;
        }

        let (tx, rx) = tokio::sync::watch::channel(false);
        *self.health_shutdown.lock().await = Some(tx);
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_health_loop(rx).await });

        info!(target = "supervisor", "started");
        self.emit(SupervisorEvent::Started);
        Ok(())
    }

    /// Transitions `Running → Stopped`: stops every component and the health
    /// loop. Idempotent: re-calling while already `Stopped` is a no-op that
    /// logs a warning.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        {
            let mut state = self.state.lock().await;
            if *state == LifecycleState::Stopped {
                warn!(target = "supervisor", "stop() called while already stopped; no-op");
                return Ok(());
            }
            if !state.can_stop() {
                return Err(SupervisorError::InvalidTransition { action: "stop", state: state.label() });
            }
            *state = LifecycleState::Stopped;
        }

        if let Some(tx) = self.health_shutdown.lock().await.take() {
            let _ = tx.send(true);
        }
        for component in &self.components {
            component.stop().await;
        }

        info!(target = "supervisor", "stopped");
        self.emit(SupervisorEvent::Stopped);
        Ok(())
    }

    /// Terminal transition to `ShutDown`, bounded by
    /// `config.lifecycle.graceful_shutdown_timeout_ms`. Stops the supervisor
    /// first if it's still running. Idempotent: re-calling while already
    /// `ShutDown` is a no-op that logs a warning.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        {
            let state = *self.state.lock().await;
            if state == LifecycleState::ShutDown {
                warn!(target = "supervisor", "shutdown() called while already shut down; no-op");
                return Ok(());
            }
            if !state.can_shutdown() {
                return Err(SupervisorError::InvalidTransition { action: "shutdown", state: state.label() });
            }
        }

        if self.state().await == LifecycleState::Running {
            self.stop().await?;
        }

        let timeout = Duration::from_millis(self.config.lifecycle.graceful_shutdown_timeout_ms);
        let drain = async {
            let stops = self.components.iter().map(|component| component.stop());
            futures::future::join_all(stops).await;
        };
        if with_deadline(timeout, "graceful shutdown", drain).await.is_err() {
            warn!(target = "supervisor", "graceful shutdown exceeded deadline");
            return Err(SupervisorError::ShutdownTimedOut);
        }

        *self.state.lock().await = LifecycleState::ShutDown;
        info!(target = "supervisor", "shut down");
        self.emit(SupervisorEvent::Shutdown);
        Ok(())
    }

    /// Polls every component's health once and returns the aggregate level.
    pub async fn check_health(&self) -> HealthLevel {
        let mut unhealthy = Vec::new();
        for component in &self.components {
            if !component.health().await {
                unhealthy.push(component.name().to_string());
            }
        }

        let level = if unhealthy.is_empty() {
            HealthLevel::Healthy
        } else if unhealthy.len() == self.components.len() && !self.components.is_empty() {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Degraded
        };

        self.emit(SupervisorEvent::HealthCheck { level });
        if !matches!(level, HealthLevel::Healthy) {
            self.emit(SupervisorEvent::HealthDegraded { level, unhealthy_services: unhealthy });
        }
        level
    }

    async fn run_health_loop(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.lifecycle.health_check_interval_ms.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_health().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeComponent {
        name: &'static str,
        healthy: AtomicBool,
        start_calls: AtomicU32,
        stop_calls: AtomicU32,
    }

    #[async_trait]
    impl ManagedComponent for FakeComponent {
        fn name(&self) -> &str {
            self.name
        }
        async fn start(&self) {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
        }
        async fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
        async fn health(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn fake(name: &'static str, healthy: bool) -> Arc<FakeComponent> {
        Arc::new(FakeComponent {
            name,
            healthy: AtomicBool::new(healthy),
            start_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn full_lifecycle_transitions_in_order() {
        let a = fake("a", true);
        let supervisor = Supervisor::new(vec![a.clone()], SupervisorConfig::default(), Arc::new(EventBus::new()));

        assert_eq!(supervisor.state().await, LifecycleState::Uninitialized);
        supervisor.initialize().await.expect("can initialize");
        assert_eq!(supervisor.state().await, LifecycleState::Initialized);
        supervisor.start().await.expect("can start");
        assert_eq!(supervisor.state().await, LifecycleState::Running);
        assert_eq!(a.start_calls.load(Ordering::SeqCst), 1);
        supervisor.stop().await.expect("can stop");
        assert_eq!(supervisor.state().await, LifecycleState::Stopped);
        assert_eq!(a.stop_calls.load(Ordering::SeqCst), 1);
        supervisor.shutdown().await.expect("can shutdown");
        assert_eq!(supervisor.state().await, LifecycleState::ShutDown);
    }

    #[tokio::test]
    async fn starting_twice_is_idempotent_no_op() {
        let a = fake("a", true);
        let supervisor = Supervisor::new(vec![a.clone()], SupervisorConfig::default(), Arc::new(EventBus::new()));
        supervisor.initialize().await.expect("can initialize");
        supervisor.start().await.expect("can start");
        supervisor.start().await.expect("re-starting while running is a no-op");
        assert_eq!(supervisor.state().await, LifecycleState::Running);
        // The component is not started a second time.
        assert_eq!(a.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_from_uninitialized_is_rejected() {
        let supervisor = Supervisor::new(vec![fake("a", true)], SupervisorConfig::default(), Arc::new(EventBus::new()));
        let err = supervisor.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::InvalidTransition { action: "start", .. }));
    }

    #[tokio::test]
    async fn health_check_reports_degraded_when_some_components_unhealthy() {
        let a = fake("a", true);
        let b = fake("b", false);
        let supervisor = Supervisor::new(vec![a, b], SupervisorConfig::default(), Arc::new(EventBus::new()));
        let level = supervisor.check_health().await;
        assert_eq!(level, HealthLevel::Degraded);
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy_when_all_components_unhealthy() {
        let supervisor = Supervisor::new(vec![fake("a", false), fake("b", false)], SupervisorConfig::default(), Arc::new(EventBus::new()));
        let level = supervisor.check_health().await;
        assert_eq!(level, HealthLevel::Unhealthy);
    }
}
