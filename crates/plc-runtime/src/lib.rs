//! Runtime orchestration layer for the PLC monitor.
//!
//! Wires a [`ManagerFacade`](plc_core::manager::ManagerFacade) into the event
//! router, runs the one-shot demonstration, schedules periodic status reports
//! and drives startup and shutdown through the lifecycle controller.

pub mod demonstration;
pub mod event_router;
pub mod handlers;
pub mod lifecycle;
pub mod reporter;
pub mod signals;
pub mod simulator;
pub mod supervise;

#[cfg(test)]
mod stub;

pub use lifecycle::{LifecycleController, RunOutcome, ShutdownReport, ShutdownTrigger};
