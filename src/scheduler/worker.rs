//! Worker seam: how the core starts a task and learns how it ended.
//!
//! The core only ever sees these traits. The production implementation
//! spawns one OS process per task (see `process.rs`); tests substitute a
//! scripted launcher.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::pending::Sequence;
use super::slots::SlotId;
use super::topology::Device;
use crate::task::{TaskOutcome, TaskRequest};

/// Everything a launcher needs to start one task.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub sequence: Sequence,
    pub slot: SlotId,
    pub device: Device,
    /// Monotonic per-core launch counter, used for process naming.
    pub launch_id: u64,
    pub request: TaskRequest,
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Failed to prepare working directory {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open endpoint: {0}")]
    Endpoint(#[source] std::io::Error),

    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),
}

/// A started worker.
#[async_trait]
pub trait WorkerHandle: Send {
    /// Non-blocking liveness check.
    fn is_alive(&mut self) -> bool;

    /// Whether the outcome can be taken without waiting. An exited worker
    /// may still have its report in flight; implementations that carry one
    /// stay unsettled until it lands or they give up on it.
    fn is_settled(&mut self) -> bool {
        !self.is_alive()
    }

    /// Final outcome of a settled worker. Only called after `is_settled` has
    /// returned true, so it must not wait on the worker.
    async fn into_outcome(self: Box<Self>) -> TaskOutcome;
}

/// Starts workers.
pub trait Launcher: Send {
    fn launch(&mut self, assignment: Assignment) -> Result<Box<dyn WorkerHandle>, LaunchError>;
}
