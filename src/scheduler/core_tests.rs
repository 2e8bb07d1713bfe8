use super::*;
use crate::scheduler::{Device, LaunchError};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[derive(Default)]
struct Script {
    launched: Vec<Assignment>,
    finished: HashMap<Sequence, TaskOutcome>,
    refuse: HashSet<u64>,
    /// Finish every worker as soon as it is launched, echoing its device.
    auto_finish: bool,
}

#[derive(Clone, Default)]
struct ScriptedLauncher(Arc<Mutex<Script>>);

impl ScriptedLauncher {
    fn auto() -> Self {
        let l = Self::default();
        l.0.lock().unwrap().auto_finish = true;
        l
    }

    fn finish(&self, sequence: u64, outcome: TaskOutcome) {
        self.0.lock().unwrap().finished.insert(Sequence(sequence), outcome);
    }

    fn refuse(&self, launch_id: u64) {
        self.0.lock().unwrap().refuse.insert(launch_id);
    }

    fn launched(&self) -> Vec<(u64, u32, usize)> {
        self.0
            .lock()
            .unwrap()
            .launched
            .iter()
            .map(|a| (a.sequence.0, a.device.0, a.slot.slot))
            .collect()
    }
}

struct ScriptedWorker {
    sequence: Sequence,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl WorkerHandle for ScriptedWorker {
    fn is_alive(&mut self) -> bool {
        !self.script.lock().unwrap().finished.contains_key(&self.sequence)
    }

    async fn into_outcome(self: Box<Self>) -> TaskOutcome {
        self.script
            .lock()
            .unwrap()
            .finished
            .remove(&self.sequence)
            .unwrap_or(TaskOutcome::failed(FailureReason::WorkerLost { exit_code: None }))
    }
}

impl Launcher for ScriptedLauncher {
    fn launch(&mut self, assignment: Assignment) -> Result<Box<dyn WorkerHandle>, LaunchError> {
        let mut script = self.0.lock().unwrap();
        if script.refuse.contains(&assignment.launch_id) {
            return Err(LaunchError::Spawn(std::io::Error::other("refused")));
        }
        let sequence = assignment.sequence;
        if script.auto_finish {
            let device = assignment.device.0;
            script
                .finished
                .insert(sequence, TaskOutcome::value(json!({ "device": device })));
        }
        script.launched.push(assignment);
        Ok(Box::new(ScriptedWorker {
            sequence,
            script: self.0.clone(),
        }))
    }
}

fn core(
    devices: Vec<u32>,
    capacities: Vec<usize>,
    launcher: ScriptedLauncher,
) -> SchedulerCore<ScriptedLauncher> {
    SchedulerCore::new(Topology::new(devices, capacities).unwrap(), launcher)
}

fn submit(core: &mut SchedulerCore<ScriptedLauncher>, name: &str) {
    core.accept(CoreInbound::Submit {
        request: TaskRequest::new("/tmp/devsched-test", "m", name),
    });
}

#[test]
fn single_slots_fill_breadth_first() {
    let launcher = ScriptedLauncher::default();
    let mut core = core(vec![0, 1], vec![1, 1], launcher.clone());
    for name in ["a", "b", "c"] {
        submit(&mut core, name);
    }
    assert_eq!(core.dispatch(), 2);
    assert_eq!(launcher.launched(), vec![(0, 0, 0), (1, 1, 0)]);
    assert_eq!(core.queued(), 1);
}

#[test]
fn slot_zero_of_every_device_before_slot_one() {
    let launcher = ScriptedLauncher::default();
    let mut core = core(vec![0, 1], vec![2, 2], launcher.clone());
    for name in ["a", "b", "c", "d", "e"] {
        submit(&mut core, name);
    }
    assert_eq!(core.dispatch(), 4);
    assert_eq!(
        launcher.launched(),
        vec![(0, 0, 0), (1, 1, 0), (2, 0, 1), (3, 1, 1)]
    );
    assert!(core.slots().is_full());
}

#[tokio::test]
async fn freed_slot_is_refilled() {
    let launcher = ScriptedLauncher::default();
    let mut core = core(vec![4, 7], vec![1, 1], launcher.clone());
    for name in ["a", "b", "c"] {
        submit(&mut core, name);
    }
    core.dispatch();
    assert_eq!(core.running(), 2);

    launcher.finish(1, TaskOutcome::Empty);
    assert_eq!(core.collect().await, 1);
    assert_eq!(core.dispatch(), 1);
    // the third request lands on the device that freed up
    assert_eq!(launcher.launched()[2], (2, 7, 0));
    assert!(core.slots().occupied_on(0) <= 1);
    assert!(core.slots().occupied_on(1) <= 1);
}

#[tokio::test]
async fn later_results_wait_for_the_head() {
    let launcher = ScriptedLauncher::default();
    let mut core = core(vec![0, 1], vec![1, 1], launcher.clone());
    submit(&mut core, "slow");
    submit(&mut core, "fast");
    core.dispatch();

    launcher.finish(1, TaskOutcome::value(1));
    core.collect().await;
    assert!(core.drain_ready().is_empty());
    assert!(core.pending().is_ready(Sequence(1)));

    launcher.finish(0, TaskOutcome::value(0));
    core.collect().await;
    let delivered = core.drain_ready();
    assert_eq!(
        delivered,
        vec![
            (Sequence(0), TaskOutcome::value(0)),
            (Sequence(1), TaskOutcome::value(1)),
        ]
    );
}

#[tokio::test]
async fn launch_failure_is_delivered_in_order() {
    let launcher = ScriptedLauncher::default();
    launcher.refuse(0);
    let mut core = core(vec![0], vec![1], launcher.clone());
    submit(&mut core, "a");
    submit(&mut core, "b");

    // the refused launch frees its slot immediately
    assert_eq!(core.dispatch(), 2);
    assert_eq!(core.running(), 1);
    assert_eq!(
        core.drain_ready(),
        vec![(
            Sequence(0),
            TaskOutcome::failed(FailureReason::LaunchFailed)
        )]
    );

    launcher.finish(1, TaskOutcome::Empty);
    core.collect().await;
    assert_eq!(core.drain_ready(), vec![(Sequence(1), TaskOutcome::Empty)]);
    assert_eq!(
        core.stats(),
        CoreStats {
            dispatched: 2,
            succeeded: 1,
            failed: 1
        }
    );
}

#[tokio::test]
async fn shutdown_drains_accepted_work_and_ignores_new() {
    let launcher = ScriptedLauncher::default();
    let mut core = core(vec![0], vec![1], launcher.clone());
    submit(&mut core, "a");
    core.accept(CoreInbound::Shutdown);
    submit(&mut core, "late");
    assert_eq!(core.queued(), 1);

    core.dispatch();
    assert!(!core.is_finished());

    launcher.finish(0, TaskOutcome::Empty);
    core.collect().await;
    core.drain_ready();
    assert!(core.is_finished());
    assert_eq!(core.stats().dispatched, 1);
}

#[test]
fn idle_core_is_not_finished_without_shutdown() {
    let core = core(vec![0], vec![1], ScriptedLauncher::default());
    assert!(!core.is_finished());
}

fn fast_config() -> EnvConfig {
    EnvConfig {
        poll_interval: Duration::from_millis(1),
        ..EnvConfig::default()
    }
}

#[tokio::test]
async fn run_core_delivers_everything_then_exits() {
    let (handle_side, core_side) = tokio::io::duplex(64 * 1024);
    let (core_read, core_write) = tokio::io::split(core_side);
    let (handle_read, handle_write) = tokio::io::split(handle_side);

    let launcher = ScriptedLauncher::auto();
    let core = core(vec![0, 1], vec![1, 1], launcher);
    let cfg = fast_config();
    let task = tokio::spawn(async move { run_core(core_read, core_write, core, &cfg).await });

    let mut writer = FrameWriter::new(handle_write, DEFAULT_TEST_FRAME);
    for name in ["a", "b", "c", "d"] {
        writer
            .send(&CoreInbound::Submit {
                request: TaskRequest::new("/tmp/devsched-test", "m", name),
            })
            .await
            .unwrap();
    }
    writer.send(&CoreInbound::Shutdown).await.unwrap();

    let mut reader = FrameReader::new(handle_read, DEFAULT_TEST_FRAME);
    let mut sequences = Vec::new();
    while let Some(CoreOutbound::Outcome { sequence, outcome }) =
        reader.recv::<CoreOutbound>().await.unwrap()
    {
        assert!(!outcome.is_failure());
        sequences.push(sequence.0);
    }
    assert_eq!(sequences, vec![0, 1, 2, 3]);

    let stats = task.await.unwrap().unwrap();
    assert_eq!(stats.dispatched, 4);
    assert_eq!(stats.succeeded, 4);
}

#[tokio::test]
async fn closed_input_counts_as_shutdown() {
    let (handle_side, core_side) = tokio::io::duplex(4096);
    let (core_read, core_write) = tokio::io::split(core_side);
    let (handle_read, mut handle_write) = tokio::io::split(handle_side);
    handle_write.shutdown().await.unwrap();

    let core = core(vec![0], vec![1], ScriptedLauncher::auto());
    let cfg = fast_config();
    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        run_core(core_read, core_write, core, &cfg),
    )
    .await
    .expect("core should exit on closed input")
    .unwrap();
    assert_eq!(stats, CoreStats::default());
    drop(handle_read);
}

#[tokio::test]
async fn oversize_outcome_is_replaced_in_place() {
    let (handle_side, core_side) = tokio::io::duplex(64 * 1024);
    let (core_read, core_write) = tokio::io::split(core_side);
    let (handle_read, handle_write) = tokio::io::split(handle_side);

    let launcher = ScriptedLauncher::default();
    launcher.finish(0, TaskOutcome::value("x".repeat(5000)));
    launcher.finish(1, TaskOutcome::Empty);
    let core = core(vec![0], vec![2], launcher);
    let cfg = EnvConfig {
        frame_limit: 4096,
        ..fast_config()
    };
    let task = tokio::spawn(async move { run_core(core_read, core_write, core, &cfg).await });

    let mut writer = FrameWriter::new(handle_write, 4096);
    for name in ["big", "small"] {
        writer
            .send(&CoreInbound::Submit {
                request: TaskRequest::new("/tmp/devsched-test", "m", name),
            })
            .await
            .unwrap();
    }
    writer.send(&CoreInbound::Shutdown).await.unwrap();

    let mut reader = FrameReader::new(handle_read, 4096);
    let mut delivered = Vec::new();
    while let Some(CoreOutbound::Outcome { sequence, outcome }) =
        reader.recv::<CoreOutbound>().await.unwrap()
    {
        delivered.push((sequence, outcome));
    }
    assert_eq!(
        delivered,
        vec![
            (
                Sequence(0),
                TaskOutcome::failed(FailureReason::OutcomeTooLarge)
            ),
            (Sequence(1), TaskOutcome::Empty),
        ]
    );

    let stats = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("core should exit after shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn unread_output_does_not_stop_accepted_work() {
    let (mut to_core, core_in) = tokio::io::duplex(64 * 1024);
    let (core_out, from_core) = tokio::io::duplex(64 * 1024);
    drop(from_core);

    let launcher = ScriptedLauncher::auto();
    let core = core(vec![0], vec![1], launcher.clone());
    let cfg = fast_config();

    {
        let mut writer = FrameWriter::new(&mut to_core, DEFAULT_TEST_FRAME);
        for name in ["a", "b", "c"] {
            writer
                .send(&CoreInbound::Submit {
                    request: TaskRequest::new("/tmp/devsched-test", "m", name),
                })
                .await
                .unwrap();
        }
        writer.send(&CoreInbound::Shutdown).await.unwrap();
    }

    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        run_core(core_in, core_out, core, &cfg),
    )
    .await
    .expect("core should finish without a reader")
    .unwrap();
    assert_eq!(stats.dispatched, 3);
    assert_eq!(launcher.launched().len(), 3);
    drop(to_core);
}

/// Exited, but its report has not landed yet.
struct LateReport {
    polls: usize,
}

#[async_trait]
impl WorkerHandle for LateReport {
    fn is_alive(&mut self) -> bool {
        false
    }

    fn is_settled(&mut self) -> bool {
        self.polls += 1;
        self.polls > 2
    }

    async fn into_outcome(self: Box<Self>) -> TaskOutcome {
        TaskOutcome::Empty
    }
}

struct LateLauncher;

impl Launcher for LateLauncher {
    fn launch(&mut self, _: Assignment) -> Result<Box<dyn WorkerHandle>, LaunchError> {
        Ok(Box::new(LateReport { polls: 0 }))
    }
}

#[tokio::test]
async fn exited_worker_keeps_its_slot_until_settled() {
    let topology = Topology::new(vec![0], vec![1]).unwrap();
    let mut core = SchedulerCore::new(topology, LateLauncher);
    core.accept(CoreInbound::Submit {
        request: TaskRequest::new("/tmp/devsched-test", "m", "a"),
    });
    core.dispatch();

    assert_eq!(core.collect().await, 0);
    assert_eq!(core.collect().await, 0);
    assert!(core.slots().is_full());
    assert_eq!(core.collect().await, 1);
    assert_eq!(core.drain_ready(), vec![(Sequence(0), TaskOutcome::Empty)]);
}

const DEFAULT_TEST_FRAME: usize = crate::ipc::DEFAULT_MAX_FRAME;

#[test]
fn device_lookup_follows_topology_rows() {
    let core = core(vec![9, 3], vec![1, 2], ScriptedLauncher::default());
    assert_eq!(core.topology().device(1), Device(3));
    assert_eq!(core.slots().capacity(), 3);
}
