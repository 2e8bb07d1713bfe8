//! Multi-device task scheduling.
//!
//! The [`Scheduler`] handle lives in the submitting process. It spawns a
//! core process that owns the [`SlotMatrix`] and [`PendingResults`], runs
//! each task in its own worker process, and delivers outcomes strictly in
//! submission order.

mod core;
mod error;
mod handle;
mod lifecycle;
mod pending;
mod process;
mod slots;
mod topology;
mod worker;

pub use self::core::{run_core, CoreStats, SchedulerCore};
pub use error::SchedulerError;
pub use handle::Scheduler;
pub use lifecycle::LifecycleState;
pub use pending::{PendingResults, Sequence};
pub use process::{ProcessLauncher, ProcessWorker};
pub use slots::{SlotId, SlotMatrix};
pub use topology::{Device, Topology, TopologyError};
pub use worker::{Assignment, LaunchError, Launcher, WorkerHandle};
