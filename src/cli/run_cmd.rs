//! `devsched run`: feed a batch of JSON-lines jobs through a scheduler.
//!
//! Each input line is a task request; `working_dir` may be omitted, in which
//! case the job gets `<workdir>/job-<n>`. Outcomes are printed to stdout as
//! JSON lines in input order.

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::io::AsyncReadExt;

use crate::scheduler::Scheduler;
use crate::task::{TaskOutcome, TaskRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub devices: Vec<u32>,
    pub capacities: Vec<usize>,
    /// `None` reads jobs from stdin.
    pub jobs: Option<PathBuf>,
    pub workdir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct JobLine {
    #[serde(default)]
    working_dir: Option<PathBuf>,
    module_name: String,
    function_name: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default)]
    kwargs: Map<String, Value>,
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_list<T: FromStr>(raw: &str, flag: &str) -> Result<Vec<T>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|_| format!("{flag}: invalid entry '{}'", s.trim()))
        })
        .collect()
}

impl RunArgs {
    /// Parse the arguments following `run`.
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let devices = flag_value(args, "--devices").ok_or("--devices is required")?;
        let devices = parse_list::<u32>(devices, "--devices")?;
        let capacities = match flag_value(args, "--capacities") {
            Some(raw) => parse_list::<usize>(raw, "--capacities")?,
            None => vec![1; devices.len()],
        };
        let workdir = flag_value(args, "--workdir")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("devsched-run"));
        Ok(Self {
            devices,
            capacities,
            jobs: flag_value(args, "--jobs").map(PathBuf::from),
            workdir,
        })
    }
}

fn parse_jobs(input: &str, workdir: &std::path::Path) -> Result<Vec<TaskRequest>, String> {
    input
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(n, line)| {
            let job: JobLine =
                serde_json::from_str(line).map_err(|e| format!("job {n}: {e}"))?;
            Ok(TaskRequest {
                working_dir: job
                    .working_dir
                    .unwrap_or_else(|| workdir.join(format!("job-{n}"))),
                module_name: job.module_name,
                function_name: job.function_name,
                args: job.args,
                kwargs: job.kwargs,
            })
        })
        .collect()
}

async fn read_input(jobs: &Option<PathBuf>) -> std::io::Result<String> {
    match jobs {
        Some(path) => tokio::fs::read_to_string(path).await,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            Ok(buf)
        }
    }
}

/// Run the jobs. Exit code 0 if every job succeeded, 1 if any failed,
/// 2 on usage errors.
pub async fn run(args: &[String]) -> i32 {
    let args = match RunArgs::parse(args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };
    let input = match read_input(&args.jobs).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot read jobs: {e}");
            return 2;
        }
    };
    let requests = match parse_jobs(&input, &args.workdir) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };

    match execute(args.devices, args.capacities, requests).await {
        Ok(failed) if failed == 0 => 0,
        Ok(failed) => {
            eprintln!("{failed} job(s) failed");
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

async fn execute(
    devices: Vec<u32>,
    capacities: Vec<usize>,
    requests: Vec<TaskRequest>,
) -> Result<usize, crate::scheduler::SchedulerError> {
    let mut scheduler = Scheduler::new(devices, capacities)?;
    scheduler.start()?;

    let total = requests.len();
    for request in requests {
        scheduler.submit(request)?;
    }

    let mut failed = 0;
    for index in 0..total {
        let outcome: TaskOutcome = scheduler.recv().await?;
        if outcome.is_failure() {
            failed += 1;
        }
        println!("{}", json!({ "index": index, "outcome": outcome }));
    }
    scheduler.stop().await?;
    Ok(failed)
}
