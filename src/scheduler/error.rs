use thiserror::Error;

use super::topology::TopologyError;
use crate::ipc::IpcError;
use crate::task::RequestError;

/// Errors surfaced by the scheduler handle.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Scheduler has not been started")]
    NotStarted,

    #[error("Scheduler is already running")]
    AlreadyStarted,

    #[error("Scheduler has been stopped")]
    Stopped,

    #[error("Failed to spawn core process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Core process exited unexpectedly")]
    CoreExited,

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),
}
