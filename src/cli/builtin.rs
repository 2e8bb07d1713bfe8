//! Tasks shipped with the `devsched` binary, registered under `builtin`.
//!
//! Useful for exercising a device layout from the command line without
//! writing a host program.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use crate::task::Registry;

pub const MODULE: &str = "builtin";

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Registry holding the builtin tasks.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        // {args, kwargs, device}
        .register(MODULE, "echo", |call| {
            Ok(Some(json!({
                "args": call.args,
                "kwargs": call.kwargs,
                "device": call.device,
            })))
        })
        // sleeps for the `ms` kwarg and reports when it ran
        .register(MODULE, "sleep", |call| {
            let ms: u64 = call.kwarg("ms")?.unwrap_or(0);
            let started_at_ms = now_ms();
            std::thread::sleep(Duration::from_millis(ms));
            Ok(Some(json!({
                "device": call.device,
                "ms": ms,
                "started_at_ms": started_at_ms,
                "finished_at_ms": now_ms(),
            })))
        })
        .register(MODULE, "noop", |_| Ok(None))
        .register(MODULE, "print", |call| {
            let line: Vec<String> = call
                .args
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            println!("{}", line.join(" "));
            Ok(None)
        })
        .register(MODULE, "fail", |call| {
            let message: Option<String> = call.kwarg("message")?;
            anyhow::bail!(
                "deliberate failure on device {}: {}",
                call.device,
                message.as_deref().unwrap_or("requested by caller")
            )
        })
        .register(MODULE, "panic", |call| {
            panic!("deliberate panic on device {}", call.device)
        })
        // ends the worker without a report, with the `code` kwarg (default 3)
        .register(MODULE, "exit", |call| {
            let code: i32 = call.kwarg("code")?.unwrap_or(3);
            std::process::exit(code)
        });
    registry
}
