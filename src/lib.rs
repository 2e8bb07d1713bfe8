//! devsched: a local multi-device task scheduler.
//!
//! A [`Scheduler`](scheduler::Scheduler) handle spawns a core process that
//! assigns each submitted task to a free slot on one of a fixed set of
//! devices and runs it in its own worker process. Slots fill breadth-first
//! across devices, and outcomes come back strictly in submission order.
//!
//! # Process roles
//!
//! The core and the workers are the host program re-executed with a role
//! in its environment. Host programs build their task [`Registry`](task::Registry)
//! and call [`role::run_role`] before doing anything else:
//!
//! ```no_run
//! use devsched::{role::run_role, scheduler::Scheduler, task::{Registry, TaskRequest}};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::process::ExitCode {
//!     let mut registry = Registry::new();
//!     registry.register("math", "square", |call| {
//!         let n: i64 = call.arg(0)?;
//!         Ok(Some(json!(n * n)))
//!     });
//!     if let Some(code) = run_role(&registry).await {
//!         return code;
//!     }
//!
//!     let mut scheduler = Scheduler::new(vec![0, 1], vec![2, 2]).unwrap();
//!     scheduler.start().unwrap();
//!     scheduler.submit(TaskRequest::new("/tmp/square", "math", "square").arg(7)).unwrap();
//!     println!("{:?}", scheduler.recv().await.unwrap());
//!     scheduler.stop().await.unwrap();
//!     std::process::ExitCode::SUCCESS
//! }
//! ```

pub mod cli;
pub mod config;
pub mod ipc;
pub mod role;
pub mod scheduler;
pub mod task;
pub mod telemetry;
