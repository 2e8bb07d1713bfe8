//! Process roles.
//!
//! The scheduler re-executes the host program for its core and for every
//! worker. The role is selected by [`ROLE_ENV`]; a host program calls
//! [`run_role`] first thing in `main` and returns its exit code when it is
//! `Some`. With no role set, the program is the submitting process and
//! carries on normally.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use crate::config::{self, EnvConfig};
use crate::ipc::{Endpoint, FrameReader, FrameWriter, IpcError, WorkerInbound, WorkerOutbound};
use crate::scheduler::{run_core, Device, ProcessLauncher, SchedulerCore, Topology};
use crate::task::{FailureReason, Registry, TaskCall, TaskOutcome, TaskRequest};
use crate::telemetry::{init_logging, LogError, SpanExt, TaskSpan};

/// Selects the process role.
pub const ROLE_ENV: &str = "DEVSCHED_ROLE";
/// JSON topology handed to the core.
pub const TOPOLOGY_ENV: &str = "DEVSCHED_TOPOLOGY";
/// Program the core re-executes for workers.
pub const PROGRAM_ENV: &str = "DEVSCHED_PROGRAM";
/// Display name of a worker process.
pub const PROCESS_NAME_ENV: &str = "DEVSCHED_PROCESS_NAME";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Core,
    Worker,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "core" => Some(Self::Core),
            "worker" => Some(Self::Worker),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Worker => "worker",
        }
    }

    /// Role of the current process, if one was assigned.
    pub fn from_env() -> Option<Result<Self, String>> {
        let raw = std::env::var(ROLE_ENV).ok()?;
        Some(Self::parse(&raw).ok_or(raw))
    }
}

/// Run the assigned role to completion, or return `None` if the current
/// process has no role.
pub async fn run_role(registry: &Registry) -> Option<ExitCode> {
    let role = Role::from_env()?;
    let cfg = config::load();
    if let Err(e) = init_logging(&cfg.log) {
        if !matches!(e, LogError::AlreadyInitialized) {
            eprintln!("devsched: {e}");
        }
    }

    let code = match role {
        Ok(Role::Core) => core_main(&cfg).await,
        Ok(Role::Worker) => worker_main(registry, &cfg).await,
        Err(raw) => {
            tracing::error!(role = %raw, "unknown process role");
            ExitCode::FAILURE
        }
    };
    Some(code)
}

async fn core_main(cfg: &EnvConfig) -> ExitCode {
    let topology = match std::env::var(TOPOLOGY_ENV)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<Topology>(&raw).map_err(|e| e.to_string()))
    {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "core started without a valid topology");
            return ExitCode::FAILURE;
        }
    };
    let program = match std::env::var_os(PROGRAM_ENV) {
        Some(p) => PathBuf::from(p),
        None => match std::env::current_exe() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "cannot resolve worker program");
                return ExitCode::FAILURE;
            }
        },
    };

    tracing::info!(
        devices = ?topology.devices(),
        total_capacity = topology.total_capacity(),
        "core started"
    );
    let launcher = ProcessLauncher::new(program, cfg.frame_limit, cfg.result_grace);
    let core = SchedulerCore::new(topology, launcher);

    match run_core(tokio::io::stdin(), tokio::io::stdout(), core, cfg).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "core terminated");
            ExitCode::FAILURE
        }
    }
}

async fn worker_main(registry: &Registry, cfg: &EnvConfig) -> ExitCode {
    let name = std::env::var(PROCESS_NAME_ENV).unwrap_or_else(|_| "TaskProcess".to_string());
    tracing::debug!(process = %name, pid = std::process::id(), "worker started");
    match serve_one(registry, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "worker could not complete its exchange");
            ExitCode::FAILURE
        }
    }
}

async fn serve_one(registry: &Registry, cfg: &EnvConfig) -> Result<(), IpcError> {
    let endpoint = Endpoint::from_env().ok_or(IpcError::Unexpected("no endpoint assigned"))?;
    let stream = endpoint.connect().await?;
    let (r, w) = tokio::io::split(stream);
    let mut reader = FrameReader::new(r, cfg.frame_limit);
    let mut writer = FrameWriter::new(w, cfg.frame_limit);

    let message = reader.recv::<WorkerInbound>().await?;
    let Some(WorkerInbound::Run { device, request }) = message else {
        return Err(IpcError::Closed);
    };
    let outcome = execute(registry, device, request);
    match writer.send(&WorkerOutbound::Finished { outcome }).await {
        Err(IpcError::MessageTooLarge { size, max }) => {
            tracing::error!(size, max, "task result exceeds frame limit");
            let outcome = TaskOutcome::failed(FailureReason::OutcomeTooLarge);
            writer.send(&WorkerOutbound::Finished { outcome }).await?;
        }
        sent => sent?,
    }
    writer.close().await
}

/// Run one task in the current process.
///
/// Handler errors and panics are reported on stderr, which for a worker is
/// the task's `error.txt`, and mapped to a coarse failure reason.
pub fn execute(registry: &Registry, device: Device, request: TaskRequest) -> TaskOutcome {
    let task = request.qualified_name();
    let span = TaskSpan::new(&task, device);
    let _enter = span.enter();
    let started = Instant::now();

    let outcome = match registry.get(&request.module_name, &request.function_name) {
        None => {
            tracing::error!(task = %task, "no task registered under this name");
            TaskOutcome::failed(FailureReason::UnknownTask)
        }
        Some(handler) => {
            let call = TaskCall {
                device,
                working_dir: request.working_dir,
                args: request.args,
                kwargs: request.kwargs,
            };
            match catch_unwind(AssertUnwindSafe(|| handler(call))) {
                Ok(Ok(value)) => TaskOutcome::from(value),
                Ok(Err(e)) => {
                    tracing::error!(task = %task, error = %format!("{e:#}"), "task failed");
                    eprintln!("{e:?}");
                    TaskOutcome::failed(FailureReason::TaskError)
                }
                Err(_) => TaskOutcome::failed(FailureReason::TaskPanicked),
            }
        }
    };

    span.record("elapsed_ms", started.elapsed().as_millis() as u64);
    span.record_outcome(&outcome);
    tracing::info!(status = outcome.status(), "task finished");
    outcome
}
