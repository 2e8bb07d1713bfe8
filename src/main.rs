//! devsched entry point.
//!
//! The same binary serves three roles: the submitting CLI, the scheduler
//! core, and each task worker. The role is chosen by the environment the
//! core and workers are spawned with.
//!
//! ## CLI Subcommands
//!
//! - `devsched run` - Run a batch of JSON-lines jobs
//! - `devsched tasks` - List builtin tasks
//! - `devsched config` - Show or validate configuration

use std::process::ExitCode;

use devsched::cli::{builtin, config_cmd, run_cmd, run_tasks};
use devsched::role::run_role;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let registry = builtin::registry();
    if let Some(code) = run_role(&registry).await {
        return code;
    }

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "run" => {
            let code = run_cmd::run(&args[2..]).await;
            ExitCode::from(code as u8)
        }
        "tasks" => {
            run_tasks();
            ExitCode::SUCCESS
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    config_cmd::run_show();
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => {
                    let code = config_cmd::run_validate();
                    ExitCode::from(code as u8)
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("devsched {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "devsched - local multi-device task scheduler v{}

USAGE:
    devsched [COMMAND] [OPTIONS]

COMMANDS:
    run          Run JSON-lines jobs and print outcomes in input order
    tasks        List builtin tasks
    config       Show configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

RUN OPTIONS:
    --devices LIST      Comma-separated device ids (required)
    --capacities LIST   Slots per device (default: 1 each)
    --jobs FILE         Jobs file (default: stdin)
    --workdir DIR       Parent of per-job working directories

EXAMPLES:
    devsched run --devices 0,1 --capacities 2,2 --jobs jobs.jsonl
    echo '{{\"module_name\":\"builtin\",\"function_name\":\"echo\"}}' | devsched run --devices 0

ENVIRONMENT:
    DEVSCHED_POLL_INTERVAL_MS  Core idle interval (default: 10)
    DEVSCHED_FRAME_LIMIT       Max IPC frame bytes (default: 16777216)
    DEVSCHED_RESULT_GRACE_MS   Wait for an exited worker's report (default: 2000)
    DEVSCHED_LOG_LEVEL         Log filter (default: info)
    DEVSCHED_LOG_FORMAT        json or pretty (default: json)

EXIT CODES:
    0  Success
    1  Failure / some jobs failed
    2  Usage error
",
        version
    );
}
