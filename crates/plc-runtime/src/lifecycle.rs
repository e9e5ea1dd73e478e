//! Top-level lifecycle of the orchestrator.
//!
//! [`LifecycleController`] owns the [`StateMachine`], the event router, the
//! event pump task and the periodic reporter. It is the only component that
//! calls the Manager's `initialize` and `shutdown`.
//!
//! Startup order:
//! 1. subscribe to the Manager's event stream and start dispatching,
//! 2. `initialize` the Manager,
//! 3. run the demonstration once,
//! 4. start the periodic reporter.
//!
//! Shutdown closes the router, stops the reporter (bounded wait), then calls
//! the Manager's `shutdown` (bounded wait). Neither bound can keep the process
//! from exiting.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use plc_core::error::{OrchestratorError, Result};
use plc_core::manager::ManagerFacade;
use plc_core::settings::OrchestratorConfig;
use plc_core::state::{OrchestratorState, StateMachine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::demonstration::{DemonstrationReport, DemonstrationRunner};
use crate::event_router::EventRouter;
use crate::handlers::register_default_handlers;
use crate::reporter::{PeriodicReporter, ReporterHandle, StopOutcome};
use crate::supervise::{spawn_supervised, Fault, FaultReporter};

// ── Public types ──────────────────────────────────────────────────────────────

/// How the Manager's shutdown call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerShutdown {
    Completed,
    Failed(String),
    TimedOut,
    /// The Manager was never initialized, so it was not asked to shut down.
    NotStarted,
}

/// Result of [`LifecycleController::shutdown`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReport {
    /// Shutdown was already in progress or finished; nothing was done.
    Skipped,
    Completed {
        /// `None` when the reporter was never started.
        reporter: Option<StopOutcome>,
        manager: ManagerShutdown,
    },
}

/// What made [`LifecycleController::run`] shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal,
    Fault(Fault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub trigger: ShutdownTrigger,
    pub shutdown: ShutdownReport,
}

// ── LifecycleController ───────────────────────────────────────────────────────

pub struct LifecycleController {
    manager: Arc<dyn ManagerFacade>,
    config: OrchestratorConfig,
    state: StateMachine,
    /// Registration-phase router; taken and frozen by `start`.
    pending_router: Option<EventRouter>,
    router: Option<Arc<EventRouter>>,
    event_pump: Option<JoinHandle<()>>,
    reporter: Option<ReporterHandle>,
    faults: FaultReporter,
    fault_rx: mpsc::UnboundedReceiver<Fault>,
    demonstration: Option<DemonstrationReport>,
}

impl LifecycleController {
    /// Controller with the default logging handler for every event kind.
    pub fn new(manager: Arc<dyn ManagerFacade>, config: OrchestratorConfig) -> Self {
        let mut router = EventRouter::new();
        register_default_handlers(&mut router);
        Self::with_router(manager, config, router)
    }

    /// Controller dispatching through `router`.
    pub fn with_router(
        manager: Arc<dyn ManagerFacade>,
        config: OrchestratorConfig,
        router: EventRouter,
    ) -> Self {
        let (faults, fault_rx) = FaultReporter::channel();
        Self {
            manager,
            config,
            state: StateMachine::new(),
            pending_router: Some(router),
            router: None,
            event_pump: None,
            reporter: None,
            faults,
            fault_rx,
            demonstration: None,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state.current()
    }

    /// Handle for reporting unhandled faults from elsewhere in the process.
    pub fn fault_reporter(&self) -> FaultReporter {
        self.faults.clone()
    }

    /// The router, while handlers can still be registered (before `start`).
    pub fn router_mut(&mut self) -> Option<&mut EventRouter> {
        self.pending_router.as_mut()
    }

    pub fn demonstration_report(&self) -> Option<&DemonstrationReport> {
        self.demonstration.as_ref()
    }

    /// The periodic task handle; present only while running.
    pub fn reporter(&self) -> Option<&ReporterHandle> {
        self.reporter.as_ref()
    }

    // ── Startup ───────────────────────────────────────────────────────────

    /// Bring the Manager up and start the steady-state activities.
    ///
    /// Returns [`OrchestratorError::Startup`] (state `Stopped`) when the
    /// Manager rejects initialization.
    pub async fn start(&mut self) -> Result<()> {
        self.state.transition(OrchestratorState::Initializing)?;

        let router = Arc::new(self.pending_router.take().unwrap_or_default());
        let rx = self.manager.subscribe();
        self.event_pump = Some(spawn_supervised(
            "event-router",
            {
                let router = router.clone();
                async move {
                    let received = router.pump(rx).await;
                    tracing::debug!(received, "event pump finished");
                }
            },
            self.faults.clone(),
        ));
        self.router = Some(router);

        tracing::info!("initializing manager");
        if let Err(e) = self.manager.initialize().await {
            tracing::error!(error = %e, "manager initialization failed");
            self.stop_event_dispatch();
            self.state.transition(OrchestratorState::Stopped)?;
            return Err(OrchestratorError::Startup(e));
        }
        self.state.transition(OrchestratorState::Running)?;
        tracing::info!("manager initialized; orchestrator running");

        if !self.config.demo_delay.is_zero() {
            time::sleep(self.config.demo_delay).await;
        }
        let report =
            DemonstrationRunner::new(self.manager.clone(), self.config.demonstration.clone())
                .run()
                .await;
        tracing::info!(
            completed = report.completed(),
            failed = report.failed(),
            "demonstration finished"
        );
        self.demonstration = Some(report);

        self.reporter = Some(
            PeriodicReporter::new(self.manager.clone(), self.config.report_interval)
                .with_faults(self.faults.clone())
                .start(),
        );
        tracing::info!(
            interval_secs = self.config.report_interval.as_secs(),
            "periodic status reporting started"
        );
        Ok(())
    }

    // ── Shutdown ──────────────────────────────────────────────────────────

    /// Stop everything and shut the Manager down. Idempotent.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let state = self.state.current();
        if state.is_terminal() {
            tracing::debug!(state = %state, "shutdown already handled");
            return ShutdownReport::Skipped;
        }
        if state == OrchestratorState::Uninitialized {
            let _ = self.state.transition(OrchestratorState::Stopped);
            return ShutdownReport::Completed {
                reporter: None,
                manager: ManagerShutdown::NotStarted,
            };
        }

        if let Err(e) = self.state.transition(OrchestratorState::ShuttingDown) {
            tracing::error!(error = %e, "unexpected state during shutdown");
        }
        tracing::info!("shutting down");

        self.stop_event_dispatch();

        let reporter = match self.reporter.take() {
            Some(handle) => Some(handle.stop(self.config.report_stop_timeout).await),
            None => None,
        };

        let manager = shutdown_manager(self.manager.as_ref(), self.config.shutdown_timeout).await;

        if let Err(e) = self.state.transition(OrchestratorState::Stopped) {
            tracing::error!(error = %e, "unexpected state after shutdown");
        }
        tracing::info!("shutdown complete");

        ShutdownReport::Completed { reporter, manager }
    }

    /// Start, then wait for `signal` or an unhandled fault, then shut down.
    ///
    /// A signal that arrives during startup abandons startup and shuts down
    /// immediately. Startup failures are returned as errors.
    pub async fn run<S>(mut self, signal: S) -> Result<RunOutcome>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(signal);

        let started = tokio::select! {
            res = self.start() => Some(res),
            _ = &mut signal => None,
        };

        let trigger = match started {
            Some(Err(e)) => return Err(e),
            Some(Ok(())) => tokio::select! {
                _ = &mut signal => ShutdownTrigger::Signal,
                Some(fault) = self.fault_rx.recv() => ShutdownTrigger::Fault(fault),
            },
            None => ShutdownTrigger::Signal,
        };

        match &trigger {
            ShutdownTrigger::Signal => tracing::info!("shutdown signal received"),
            ShutdownTrigger::Fault(fault) => {
                tracing::error!(fault = %fault, "unhandled fault; shutting down")
            }
        }

        let shutdown = self.shutdown().await;
        Ok(RunOutcome { trigger, shutdown })
    }

    // ── Private helpers ───────────────────────────────────────────────────

    /// Close the router so no handler runs again, and stop the pump task.
    fn stop_event_dispatch(&mut self) {
        if let Some(router) = &self.router {
            router.close();
        }
        if let Some(pump) = self.event_pump.take() {
            pump.abort();
        }
    }
}

async fn shutdown_manager(manager: &dyn ManagerFacade, timeout: Duration) -> ManagerShutdown {
    match time::timeout(timeout, manager.shutdown()).await {
        Ok(Ok(())) => {
            tracing::info!("manager shut down");
            ManagerShutdown::Completed
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "manager shutdown failed");
            ManagerShutdown::Failed(e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "manager shutdown timed out"
            );
            ManagerShutdown::TimedOut
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
