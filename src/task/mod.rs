//! Task requests and their terminal outcomes.
//!
//! A [`TaskRequest`] names a registered function and carries its arguments.
//! A [`TaskOutcome`] is what the submitter eventually receives for it.

mod registry;

pub use registry::{Registry, TaskCall, TaskFn};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Name of the file inside a working directory receiving the task's stdout.
pub const OUTPUT_FILE: &str = "output.txt";
/// Name of the file inside a working directory receiving the task's stderr.
pub const ERROR_FILE: &str = "error.txt";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// A function-call request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub working_dir: PathBuf,
    pub module_name: String,
    pub function_name: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskRequest {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        module_name: impl Into<String>,
        function_name: impl Into<String>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            module_name: module_name.into(),
            function_name: function_name.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// `module::function`, as used in logs and the registry listing.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.module_name, self.function_name)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.working_dir.as_os_str().is_empty() {
            return Err(RequestError::MissingField("working_dir"));
        }
        if self.module_name.is_empty() {
            return Err(RequestError::MissingField("module_name"));
        }
        if self.function_name.is_empty() {
            return Err(RequestError::MissingField("function_name"));
        }
        Ok(())
    }
}

/// Why a task produced no usable result.
///
/// Deliberately coarse: the task's own error text stays in the worker's
/// `error.txt` and never crosses the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The handler returned an error.
    TaskError,
    /// The handler panicked.
    TaskPanicked,
    /// No handler is registered under the requested name.
    UnknownTask,
    /// The worker process exited without reporting an outcome.
    WorkerLost { exit_code: Option<i32> },
    /// The worker process could not be started.
    LaunchFailed,
    /// The task's result did not fit in one frame.
    OutcomeTooLarge,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskError => write!(f, "task returned an error"),
            Self::TaskPanicked => write!(f, "task panicked"),
            Self::UnknownTask => write!(f, "no such task registered"),
            Self::WorkerLost { exit_code: Some(code) } => {
                write!(f, "worker exited with code {code} before reporting")
            }
            Self::WorkerLost { exit_code: None } => {
                write!(f, "worker terminated before reporting")
            }
            Self::LaunchFailed => write!(f, "worker process could not be launched"),
            Self::OutcomeTooLarge => write!(f, "task result exceeds the frame limit"),
        }
    }
}

/// Terminal outcome of one task, as delivered to the submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// The task returned a value.
    Value { value: Value },
    /// The task completed without returning a value.
    Empty,
    /// The task did not complete.
    Failed { reason: FailureReason },
}

impl TaskOutcome {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value { value: value.into() }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The returned value, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value { value } => Some(value),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Failed { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Short status label for logs and spans.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Value { .. } => "value",
            Self::Empty => "empty",
            Self::Failed { .. } => "failed",
        }
    }
}

impl From<Option<Value>> for TaskOutcome {
    fn from(returned: Option<Value>) -> Self {
        match returned {
            Some(value) => Self::Value { value },
            None => Self::Empty,
        }
    }
}
