//! Typed dispatch of Manager events to per-kind handlers.
//!
//! Handlers are registered on a mutable [`EventRouter`] during startup. The
//! lifecycle controller then freezes the router behind an `Arc` and runs
//! [`EventRouter::pump`] against the Manager's broadcast receiver. Once
//! [`EventRouter::close`] has been called no handler runs again.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use plc_core::events::{EventKind, ManagerEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::supervise::panic_message;

/// A registered handler. Runs synchronously on the pump task.
pub type Handler = Arc<dyn Fn(&ManagerEvent) -> anyhow::Result<()> + Send + Sync>;

/// What [`EventRouter::dispatch`] did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The registered handler ran and returned `Ok`.
    Handled,
    /// No handler is registered for the event's kind, or the kind is unknown.
    Unhandled,
    /// The handler returned an error or panicked; the message was logged.
    HandlerFailed(String),
    /// The router is closed; the event was discarded.
    Dropped,
}

// ── EventRouter ───────────────────────────────────────────────────────────────

/// Dispatch table from [`EventKind`] to exactly one [`Handler`].
#[derive(Default)]
pub struct EventRouter {
    handlers: HashMap<EventKind, Handler>,
    closed: AtomicBool,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    ///
    /// Returns `true` when an existing handler was replaced.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: Fn(&ManagerEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let replaced = self.handlers.insert(kind, Arc::new(handler)).is_some();
        if replaced {
            tracing::debug!(kind = %kind, "replaced event handler");
        }
        replaced
    }

    /// Registered kinds in a stable order.
    pub fn subscribed_kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Invoke the handler registered for the event's kind.
    ///
    /// Never panics: handler errors and handler panics are caught, logged and
    /// reported as [`DispatchOutcome::HandlerFailed`].
    pub fn dispatch(&self, event: &ManagerEvent) -> DispatchOutcome {
        if self.is_closed() {
            tracing::trace!(event = event.name(), "router closed; dropping event");
            return DispatchOutcome::Dropped;
        }

        let Some(handler) = event.kind().and_then(|k| self.handlers.get(&k)) else {
            tracing::trace!(event = event.name(), "no handler registered; ignoring event");
            return DispatchOutcome::Unhandled;
        };

        match catch_unwind(AssertUnwindSafe(|| (**handler)(event))) {
            Ok(Ok(())) => DispatchOutcome::Handled,
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                tracing::error!(event = event.name(), error = %message, "event handler failed");
                DispatchOutcome::HandlerFailed(message)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(event = event.name(), error = %message, "event handler panicked");
                DispatchOutcome::HandlerFailed(message)
            }
        }
    }

    /// Stop delivering events. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("event router closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Receive events from `rx` and dispatch them in arrival order.
    ///
    /// Returns the number of events received once the stream ends or the
    /// router is closed. A lagging receiver logs how many events it skipped
    /// and keeps going.
    pub async fn pump(self: Arc<Self>, mut rx: broadcast::Receiver<ManagerEvent>) -> u64 {
        let mut received = 0_u64;
        while !self.is_closed() {
            match rx.recv().await {
                Ok(event) => {
                    received += 1;
                    self.dispatch(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; events were skipped");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("event stream closed");
                    break;
                }
            }
        }
        received
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("kinds", &self.subscribed_kinds())
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
