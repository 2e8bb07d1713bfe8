// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client side of the scheduler.
//!
//! The handle owns the core process. Submissions travel to the core's stdin
//! through a background writer task, so [`Scheduler::submit`] never waits.
//! Outcomes are read back from the core's stdout in submission order.

use std::path::PathBuf;
use std::process::Stdio;

use bytes::Bytes;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::SchedulerError;
use super::lifecycle::LifecycleState;
use super::topology::Topology;
use crate::config::{self, FRAME_LIMIT_ENV, MIN_FRAME};
use crate::ipc::{encode, CoreInbound, CoreOutbound, FrameReader, FrameWriter, IpcError};
use crate::role::{Role, PROGRAM_ENV, ROLE_ENV, TOPOLOGY_ENV};
use crate::task::{TaskOutcome, TaskRequest};

/// Handle to a scheduler core running in its own process.
pub struct Scheduler {
    topology: Topology,
    program: Option<PathBuf>,
    frame_limit: Option<usize>,
    state: LifecycleState,
    running: Option<Running>,
}

struct Running {
    child: Child,
    frame_limit: usize,
    /// Encoded frames for the core's stdin.
    outbound: mpsc::UnboundedSender<Bytes>,
    writer: JoinHandle<Result<(), IpcError>>,
    reader: FrameReader<ChildStdout>,
}

impl Scheduler {
    /// Validate the device layout. No process is started yet.
    pub fn new(devices: Vec<u32>, capacities: Vec<usize>) -> Result<Self, SchedulerError> {
        Ok(Self::from_topology(Topology::new(devices, capacities)?))
    }

    pub fn from_topology(topology: Topology) -> Self {
        Self {
            topology,
            program: None,
            frame_limit: None,
            state: LifecycleState::NotStarted,
            running: None,
        }
    }

    /// Program to re-execute for the core and its workers.
    ///
    /// Defaults to the current executable. It must call
    /// [`run_role`](crate::role::run_role) at the top of `main`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Frame size limit for this scheduler's core and workers, overriding
    /// `DEVSCHED_FRAME_LIMIT`. Values below 4 KiB are raised to 4 KiB.
    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = Some(limit.max(MIN_FRAME));
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Spawn the core process.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        let mut next = self.state;
        next.begin()?;

        let frame_limit = self
            .frame_limit
            .unwrap_or_else(|| config::load().frame_limit);
        let program = match &self.program {
            Some(p) => p.clone(),
            None => std::env::current_exe().map_err(SchedulerError::Spawn)?,
        };
        // workers run with their working directory as cwd
        let program = std::fs::canonicalize(&program).unwrap_or(program);
        let topology = serde_json::to_string(&self.topology).map_err(IpcError::from)?;

        let mut child = Command::new(&program)
            .env(ROLE_ENV, Role::Core.as_str())
            .env(TOPOLOGY_ENV, topology)
            .env(PROGRAM_ENV, &program)
            .env(FRAME_LIMIT_ENV, frame_limit.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(false)
            .spawn()
            .map_err(SchedulerError::Spawn)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(SchedulerError::Spawn(std::io::Error::other(
                    "core pipes unavailable",
                )))
            }
        };

        let (outbound, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let writer = tokio::spawn(async move {
            let mut frames = FrameWriter::new(stdin, frame_limit);
            while let Some(frame) = rx.recv().await {
                frames.send_frame(frame).await?;
            }
            // closing stdin lets the core's reader reach end of stream
            frames.close().await
        });

        tracing::info!(
            pid = child.id(),
            devices = ?self.topology.devices(),
            "scheduler core started"
        );
        self.running = Some(Running {
            child,
            frame_limit,
            outbound,
            writer,
            reader: FrameReader::new(stdout, frame_limit),
        });
        self.state = next;
        Ok(())
    }

    /// Queue a task. Returns as soon as the request is handed to the writer.
    ///
    /// A request that does not fit in one frame is rejected here and never
    /// reaches the core.
    pub fn submit(&self, request: TaskRequest) -> Result<(), SchedulerError> {
        self.state.ensure_running()?;
        request.validate()?;
        let running = self.running.as_ref().ok_or(SchedulerError::NotStarted)?;
        running.send(&CoreInbound::Submit { request })
    }

    /// Next outcome, in submission order. Waits until it is available.
    pub async fn recv(&mut self) -> Result<TaskOutcome, SchedulerError> {
        self.state.ensure_running()?;
        let running = self.running.as_mut().ok_or(SchedulerError::NotStarted)?;
        match running.reader.recv::<CoreOutbound>().await? {
            Some(CoreOutbound::Outcome { sequence, outcome }) => {
                tracing::trace!(sequence = %sequence, status = outcome.status(), "outcome received");
                Ok(outcome)
            }
            None => Err(SchedulerError::CoreExited),
        }
    }

    /// Ask the core to finish, then wait for it to exit.
    ///
    /// All accepted tasks still run to completion. Outcomes not yet received
    /// are discarded.
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        self.state.ensure_running()?;
        let Running {
            mut child,
            frame_limit,
            outbound,
            writer,
            mut reader,
        } = self.running.take().ok_or(SchedulerError::NotStarted)?;
        self.state.finish()?;

        if let Ok(body) = encode(&CoreInbound::Shutdown, frame_limit) {
            let _ = outbound.send(Bytes::from(body));
        }
        drop(outbound);

        // keep reading so the core never blocks on a full pipe
        let mut discarded = 0usize;
        loop {
            match reader.recv::<CoreOutbound>().await {
                Ok(Some(_)) => discarded += 1,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "core output unreadable during stop");
                    break;
                }
            }
        }
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "core input closed early"),
            Err(e) => tracing::warn!(error = %e, "core writer task failed"),
        }

        let status = child.wait().await.map_err(IpcError::from)?;
        tracing::info!(%status, discarded, "scheduler core stopped");
        if status.success() {
            Ok(())
        } else {
            Err(SchedulerError::CoreExited)
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // best effort: the core drains and exits on its own
        if let Some(running) = self.running.take() {
            let _ = running.send(&CoreInbound::Shutdown);
        }
    }
}

impl Running {
    fn send(&self, message: &CoreInbound) -> Result<(), SchedulerError> {
        let body = encode(message, self.frame_limit)?;
        self.outbound
            .send(Bytes::from(body))
            .map_err(|_| SchedulerError::CoreExited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TopologyError;

    #[test]
    fn construction_validates_topology() {
        assert!(matches!(
            Scheduler::new(vec![], vec![]),
            Err(SchedulerError::InvalidTopology(TopologyError::NoDevices))
        ));
        assert!(matches!(
            Scheduler::new(vec![0, 1], vec![1]),
            Err(SchedulerError::InvalidTopology(TopologyError::LengthMismatch { .. }))
        ));
        assert!(matches!(
            Scheduler::new(vec![0], vec![0]),
            Err(SchedulerError::InvalidTopology(TopologyError::ZeroCapacity { device: 0 }))
        ));
        let s = Scheduler::new(vec![0, 1], vec![2, 1]).unwrap();
        assert_eq!(s.state(), LifecycleState::NotStarted);
        assert_eq!(s.topology().total_capacity(), 3);
    }

    #[tokio::test]
    async fn operations_before_start_are_rejected() {
        let mut s = Scheduler::new(vec![0], vec![1]).unwrap();
        assert!(matches!(
            s.submit(TaskRequest::new("/tmp", "m", "f")),
            Err(SchedulerError::NotStarted)
        ));
        assert!(matches!(s.recv().await, Err(SchedulerError::NotStarted)));
        assert!(matches!(s.stop().await, Err(SchedulerError::NotStarted)));
    }

    #[test]
    fn frame_limit_override_has_a_floor() {
        let s = Scheduler::new(vec![0], vec![1]).unwrap().with_frame_limit(10);
        assert_eq!(s.frame_limit, Some(MIN_FRAME));
    }

    #[tokio::test]
    async fn failed_spawn_leaves_handle_unstarted() {
        let mut s = Scheduler::new(vec![0], vec![1])
            .unwrap()
            .with_program("/nonexistent/devsched-program");
        assert!(matches!(s.start(), Err(SchedulerError::Spawn(_))));
        assert_eq!(s.state(), LifecycleState::NotStarted);
    }
}
