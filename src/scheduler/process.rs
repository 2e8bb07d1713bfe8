// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! One OS process per task.
//!
//! The launcher prepares the task's working directory, binds a private
//! endpoint and re-executes the host program in the worker role. A background
//! exchange sends the task over the endpoint and waits for the worker's report.

use std::fs::File;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use interprocess::local_socket::tokio::prelude::*;
use interprocess::local_socket::tokio::Listener;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::topology::Device;
use super::worker::{Assignment, LaunchError, Launcher, WorkerHandle};
use crate::ipc::{
    Endpoint, FrameReader, FrameWriter, IpcError, WorkerInbound, WorkerOutbound, ENDPOINT_ENV,
};
use crate::role::{Role, PROCESS_NAME_ENV, ROLE_ENV};
use crate::task::{FailureReason, TaskOutcome, TaskRequest, ERROR_FILE, OUTPUT_FILE};

/// Spawns worker processes from the host program.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    frame_limit: usize,
    result_grace: Duration,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, frame_limit: usize, result_grace: Duration) -> Self {
        Self {
            program: program.into(),
            frame_limit,
            result_grace,
        }
    }

    fn open_capture(dir: &std::path::Path, name: &str) -> Result<File, LaunchError> {
        let path = dir.join(name);
        File::create(&path).map_err(|source| LaunchError::WorkingDir { path, source })
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, assignment: Assignment) -> Result<Box<dyn WorkerHandle>, LaunchError> {
        let Assignment {
            sequence,
            slot,
            device,
            launch_id,
            request,
        } = assignment;
        let dir = request.working_dir.clone();
        std::fs::create_dir_all(&dir).map_err(|source| LaunchError::WorkingDir {
            path: dir.clone(),
            source,
        })?;
        let stdout = Self::open_capture(&dir, OUTPUT_FILE)?;
        let stderr = Self::open_capture(&dir, ERROR_FILE)?;

        let name = format!("TaskProcess-{launch_id}");
        let endpoint = Endpoint::unique(&format!("w{launch_id}"));
        let listener = endpoint.listen().map_err(LaunchError::Endpoint)?;

        let child = Command::new(&self.program)
            .env(ROLE_ENV, Role::Worker.as_str())
            .env(ENDPOINT_ENV, endpoint.as_str())
            .env(PROCESS_NAME_ENV, &name)
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(LaunchError::Spawn)?;

        tracing::debug!(
            process = %name,
            sequence = %sequence,
            device = %device,
            slot = slot.slot,
            task = %request.qualified_name(),
            pid = child.id(),
            "worker launched"
        );

        let exchange = tokio::spawn(exchange(listener, device, request, self.frame_limit));
        Ok(Box::new(ProcessWorker {
            name,
            child,
            status: None,
            exited_at: None,
            exchange,
            grace: self.result_grace,
        }))
    }
}

/// Accept the worker's connection, hand it the task, read back the outcome.
async fn exchange(
    listener: Listener,
    device: Device,
    request: TaskRequest,
    frame_limit: usize,
) -> Result<TaskOutcome, IpcError> {
    let stream = listener.accept().await?;
    let (r, w) = tokio::io::split(stream);
    let mut reader = FrameReader::new(r, frame_limit);
    let mut writer = FrameWriter::new(w, frame_limit);

    writer.send(&WorkerInbound::Run { device, request }).await?;
    match reader.recv::<WorkerOutbound>().await? {
        Some(WorkerOutbound::Finished { outcome }) => Ok(outcome),
        None => Err(IpcError::Closed),
    }
}

/// A running worker process and its pending report.
pub struct ProcessWorker {
    name: String,
    child: Child,
    status: Option<ExitStatus>,
    /// When the exit was first observed. The report gets `grace` from here.
    exited_at: Option<Instant>,
    exchange: JoinHandle<Result<TaskOutcome, IpcError>>,
    grace: Duration,
}

impl ProcessWorker {
    fn lost(&self) -> TaskOutcome {
        TaskOutcome::failed(FailureReason::WorkerLost {
            exit_code: self.status.and_then(|s| s.code()),
        })
    }
}

#[async_trait]
impl WorkerHandle for ProcessWorker {
    fn is_alive(&mut self) -> bool {
        if self.exited_at.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => return true,
            Ok(Some(status)) => self.status = Some(status),
            Err(e) => {
                tracing::warn!(process = %self.name, error = %e, "worker status unavailable");
            }
        }
        self.exited_at = Some(Instant::now());
        false
    }

    fn is_settled(&mut self) -> bool {
        if self.is_alive() {
            return false;
        }
        self.exchange.is_finished()
            || self
                .exited_at
                .map_or(true, |exited| exited.elapsed() >= self.grace)
    }

    async fn into_outcome(mut self: Box<Self>) -> TaskOutcome {
        if !self.exchange.is_finished() {
            self.exchange.abort();
            tracing::warn!(
                process = %self.name,
                exit_code = ?self.status.and_then(|s| s.code()),
                "worker exited without reporting"
            );
            return self.lost();
        }
        match (&mut self.exchange).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(process = %self.name, error = %e, "worker exchange failed");
                self.lost()
            }
            Err(e) => {
                tracing::warn!(process = %self.name, error = %e, "worker exchange aborted");
                self.lost()
            }
        }
    }
}
