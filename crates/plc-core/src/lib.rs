//! Core types for the PLC monitor orchestrator.
//!
//! Holds the contract consumed from the data-acquisition Manager (snapshot
//! types, events and the [`manager::ManagerFacade`] trait), the error
//! taxonomy, the lifecycle state machine, settings and text formatting.

pub mod error;
pub mod events;
pub mod formatting;
pub mod manager;
pub mod models;
pub mod settings;
pub mod state;

pub use error::{ManagerError, OrchestratorError};
pub use events::{EventKind, ManagerEvent};
pub use manager::ManagerFacade;
pub use state::OrchestratorState;
