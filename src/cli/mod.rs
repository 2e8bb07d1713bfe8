// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for the `devsched` binary.
//!
//! ## Usage
//!
//! ```bash
//! devsched run --devices 0,1 --capacities 2,2 --jobs jobs.jsonl
//! devsched tasks          # list builtin tasks
//! devsched config show    # effective configuration
//! ```

pub mod builtin;
pub mod config_cmd;
pub mod run_cmd;

/// Print the builtin task names, one per line.
pub fn run_tasks() {
    for name in builtin::registry().names() {
        println!("{name}");
    }
}
