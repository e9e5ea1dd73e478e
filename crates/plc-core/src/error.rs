use std::path::PathBuf;
use thiserror::Error;

use crate::state::OrchestratorState;

/// Failures reported by the Manager when a call cannot be served.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// The Manager could not reach a device or its backing store.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A data, status, or history query could not be answered.
    #[error("Query failed: {0}")]
    Query(String),

    /// The call was made before `initialize` completed (or after `shutdown`).
    #[error("Manager is not initialized")]
    NotInitialized,

    /// The Manager gave up waiting on an internal operation.
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Catch-all for errors from Manager implementations via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// All errors produced by the orchestrator itself.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The Manager rejected initialization; the process must exit non-zero.
    #[error("Startup failed: {0}")]
    Startup(#[source] ManagerError),

    /// A lifecycle transition that the state machine does not allow.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: OrchestratorState,
        to: OrchestratorState,
    },

    /// A configuration file could not be read or parsed.
    #[error("Configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the orchestrator crates.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
