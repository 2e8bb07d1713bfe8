//! The core: single owner of the queue, the slot matrix and the pending results.
//!
//! Each pass of [`run_core`] moves through the same phases: take in new
//! messages, dispatch queued requests into free slots, collect exited workers,
//! then deliver every result that has reached the head of the pending list.

use std::collections::{HashMap, VecDeque};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, error::TryRecvError};

use super::pending::{PendingResults, Sequence};
use super::slots::{SlotId, SlotMatrix};
use super::topology::Topology;
use super::worker::{Assignment, Launcher, WorkerHandle};
use crate::config::EnvConfig;
use crate::ipc::{CoreInbound, CoreOutbound, FrameReader, FrameWriter, IpcError};
use crate::task::{FailureReason, TaskOutcome, TaskRequest};

/// Counters reported when the core exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreStats {
    pub dispatched: u64,
    /// Delivered with a value or empty.
    pub succeeded: u64,
    pub failed: u64,
}

pub struct SchedulerCore<L> {
    topology: Topology,
    slots: SlotMatrix,
    pending: PendingResults,
    queued: VecDeque<TaskRequest>,
    workers: HashMap<SlotId, Box<dyn WorkerHandle>>,
    launcher: L,
    shutdown_requested: bool,
    launches: u64,
    stats: CoreStats,
}

impl<L: Launcher> SchedulerCore<L> {
    pub fn new(topology: Topology, launcher: L) -> Self {
        Self {
            slots: SlotMatrix::new(&topology),
            topology,
            pending: PendingResults::new(),
            queued: VecDeque::new(),
            workers: HashMap::new(),
            launcher,
            shutdown_requested: false,
            launches: 0,
            stats: CoreStats::default(),
        }
    }

    /// Apply one message from the handle.
    pub fn accept(&mut self, message: CoreInbound) {
        match message {
            CoreInbound::Submit { request } if self.shutdown_requested => {
                tracing::warn!(
                    task = %request.qualified_name(),
                    "submission after shutdown ignored"
                );
            }
            CoreInbound::Submit { request } => self.queued.push_back(request),
            CoreInbound::Shutdown => self.request_shutdown(),
        }
    }

    pub fn request_shutdown(&mut self) {
        if !self.shutdown_requested {
            tracing::info!(
                queued = self.queued.len(),
                pending = self.pending.len(),
                "shutdown requested"
            );
            self.shutdown_requested = true;
        }
    }

    /// Start queued requests, oldest first, while free slots remain.
    ///
    /// Returns the number of requests taken off the queue.
    pub fn dispatch(&mut self) -> usize {
        let mut started = 0;
        while !self.queued.is_empty() {
            let Some(slot) = self.slots.find_free() else {
                break;
            };
            let Some(request) = self.queued.pop_front() else {
                break;
            };
            self.start(slot, request);
            started += 1;
        }
        started
    }

    fn start(&mut self, slot: SlotId, request: TaskRequest) {
        let sequence = self.pending.allocate();
        let device = self.topology.device(slot.device_index);
        let launch_id = self.launches;
        self.launches += 1;
        self.stats.dispatched += 1;
        self.slots.occupy(slot, sequence);

        let assignment = Assignment {
            sequence,
            slot,
            device,
            launch_id,
            request,
        };
        match self.launcher.launch(assignment) {
            Ok(worker) => {
                self.workers.insert(slot, worker);
            }
            Err(e) => {
                tracing::error!(sequence = %sequence, device = %device, error = %e, "launch failed");
                self.slots.release(slot);
                self.pending
                    .complete(sequence, TaskOutcome::failed(FailureReason::LaunchFailed));
            }
        }
    }

    /// Reap settled workers, freeing their slots and recording their outcomes.
    ///
    /// A worker that has exited but whose report is still in flight stays in
    /// its slot until a later pass. Returns the number of workers reaped.
    pub async fn collect(&mut self) -> usize {
        let mut settled: Vec<SlotId> = self
            .workers
            .iter_mut()
            .filter_map(|(id, worker)| worker.is_settled().then_some(*id))
            .collect();
        settled.sort();

        for id in &settled {
            let Some(worker) = self.workers.remove(id) else {
                continue;
            };
            let outcome = worker.into_outcome().await;
            match self.slots.release(*id) {
                Some(sequence) => {
                    tracing::debug!(sequence = %sequence, status = outcome.status(), "worker reaped");
                    self.pending.complete(sequence, outcome);
                }
                None => tracing::warn!(slot = ?id, "reaped worker held no slot"),
            }
        }
        settled.len()
    }

    /// Remove and return every deliverable result, in sequence order.
    pub fn drain_ready(&mut self) -> Vec<(Sequence, TaskOutcome)> {
        let mut ready = Vec::new();
        while let Some((sequence, outcome)) = self.pending.pop_ready() {
            if outcome.is_failure() {
                self.stats.failed += 1;
            } else {
                self.stats.succeeded += 1;
            }
            ready.push((sequence, outcome));
        }
        ready
    }

    /// A delivered success had to be replaced by a failure.
    fn recount_as_failed(&mut self) {
        self.stats.succeeded = self.stats.succeeded.saturating_sub(1);
        self.stats.failed += 1;
    }

    /// Shutdown was requested and all accepted work has been delivered.
    pub fn is_finished(&self) -> bool {
        self.shutdown_requested && self.queued.is_empty() && self.pending.is_empty()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn slots(&self) -> &SlotMatrix {
        &self.slots
    }

    pub fn pending(&self) -> &PendingResults {
        &self.pending
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    pub fn running(&self) -> usize {
        self.workers.len()
    }

    pub fn stats(&self) -> CoreStats {
        self.stats
    }
}

/// Drive `core` until shutdown has been requested and every accepted task
/// has been delivered on `output`.
///
/// End of stream on `input` counts as a shutdown request. So does a failed
/// write to `output`: accepted tasks still run, their results are dropped.
pub async fn run_core<R, W, L>(
    input: R,
    output: W,
    mut core: SchedulerCore<L>,
    cfg: &EnvConfig,
) -> Result<CoreStats, IpcError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    L: Launcher,
{
    let (tx, mut inbound) = mpsc::unbounded_channel();
    let frame_limit = cfg.frame_limit;
    let reader_task = tokio::spawn(async move {
        let mut reader = FrameReader::new(input, frame_limit);
        loop {
            match reader.recv::<CoreInbound>().await {
                Ok(Some(message)) => {
                    if tx.send(message).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "unreadable message from handle");
                    break;
                }
            }
        }
    });

    // None once the handle has stopped reading; accepted work still runs.
    let mut writer = Some(FrameWriter::new(output, frame_limit));
    let mut inbound_open = true;
    loop {
        loop {
            match inbound.try_recv() {
                Ok(message) => core.accept(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    inbound_open = false;
                    core.request_shutdown();
                    break;
                }
            }
        }

        core.dispatch();
        core.collect().await;
        for (sequence, outcome) in core.drain_ready() {
            let Some(frames) = writer.as_mut() else {
                tracing::debug!(sequence = %sequence, status = outcome.status(), "result discarded");
                continue;
            };
            if let Err(e) = deliver(frames, &mut core, sequence, outcome).await {
                tracing::warn!(
                    error = %e,
                    queued = core.queued(),
                    running = core.running(),
                    "handle unreachable, finishing accepted work without delivery"
                );
                writer = None;
                core.request_shutdown();
            }
        }

        if core.is_finished() {
            break;
        }

        tokio::select! {
            message = inbound.recv(), if inbound_open => match message {
                Some(message) => core.accept(message),
                None => {
                    inbound_open = false;
                    core.request_shutdown();
                }
            },
            _ = tokio::time::sleep(cfg.poll_interval) => {}
        }
    }

    reader_task.abort();
    if let Some(frames) = writer {
        frames.close().await?;
    }

    let stats = core.stats();
    tracing::info!(
        dispatched = stats.dispatched,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "core finished"
    );
    Ok(stats)
}

/// Send one result. An outcome too large for a frame is replaced by a
/// failure in the same position, so later results still go out.
async fn deliver<W, L>(
    frames: &mut FrameWriter<W>,
    core: &mut SchedulerCore<L>,
    sequence: Sequence,
    outcome: TaskOutcome,
) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    L: Launcher,
{
    let was_failure = outcome.is_failure();
    match frames.send(&CoreOutbound::Outcome { sequence, outcome }).await {
        Err(IpcError::MessageTooLarge { size, max }) => {
            tracing::error!(sequence = %sequence, size, max, "outcome exceeds frame limit");
            if !was_failure {
                core.recount_as_failed();
            }
            let outcome = TaskOutcome::failed(FailureReason::OutcomeTooLarge);
            frames.send(&CoreOutbound::Outcome { sequence, outcome }).await
        }
        other => other,
    }
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
