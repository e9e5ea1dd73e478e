//! Fault reporting for background tasks.
//!
//! Anything spawned through [`spawn_supervised`] that panics, or anything
//! that calls [`FaultReporter::report`] directly, ends up on the lifecycle
//! controller's fault channel, where it triggers the shutdown path.

use std::any::Any;
use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An error that escaped every local handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Name of the task or component the fault came from.
    pub source: String,
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Cloneable sending side of the fault channel.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    tx: mpsc::UnboundedSender<Fault>,
}

impl FaultReporter {
    /// Create a reporter and the receiver the controller listens on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Fault>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report a fault. Silently ignored once the controller has gone away.
    pub fn report(&self, source: impl Into<String>, message: impl Into<String>) {
        let fault = Fault {
            source: source.into(),
            message: message.into(),
        };
        tracing::error!(source = %fault.source, message = %fault.message, "unhandled fault");
        let _ = self.tx.send(fault);
    }
}

/// Spawn `fut` and report a panic inside it as a [`Fault`].
///
/// Aborting the returned handle also aborts the inner task.
pub fn spawn_supervised<F>(name: &'static str, fut: F, faults: FaultReporter) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let inner = AbortOnDrop(tokio::spawn(fut));
    tokio::spawn(async move {
        let mut inner = inner;
        match (&mut inner.0).await {
            Ok(()) => tracing::debug!(task = name, "supervised task finished"),
            Err(e) if e.is_panic() => {
                faults.report(name, panic_message(e.into_panic().as_ref()));
            }
            Err(_) => tracing::debug!(task = name, "supervised task cancelled"),
        }
    })
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
