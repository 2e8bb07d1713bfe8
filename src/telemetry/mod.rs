//! Telemetry: structured logging and task spans.
//!
//! All output is stderr- or file-based; no network exporters.

mod logging;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use spans::{SpanExt, TaskSpan};
