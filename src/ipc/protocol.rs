//! Message schema for the handle ⇄ core and core ⇄ worker channels.
//!
//! All messages are JSON objects tagged by `type`. Size limits are enforced
//! by the framing layer before any parsing happens.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::{Device, Sequence};
use crate::task::{TaskOutcome, TaskRequest};

/// Default ceiling on a single frame body.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024; // 16 MiB

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Channel closed")]
    Closed,

    #[error("Unexpected message: {0}")]
    Unexpected(&'static str),
}

/// Messages from the handle to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreInbound {
    /// Queue a task for dispatch.
    Submit { request: TaskRequest },
    /// Stop accepting submissions; exit once all accepted work is delivered.
    Shutdown,
}

/// Messages from the core to the handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreOutbound {
    Outcome {
        sequence: Sequence,
        outcome: TaskOutcome,
    },
}

/// Messages from the core to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerInbound {
    Run { device: Device, request: TaskRequest },
}

/// Messages from a worker to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerOutbound {
    Finished { outcome: TaskOutcome },
}

/// Encode a message body, rejecting anything above `max` bytes.
pub fn encode<T: Serialize>(message: &T, max: usize) -> Result<Vec<u8>, IpcError> {
    let bytes = serde_json::to_vec(message)?;
    if bytes.len() > max {
        return Err(IpcError::MessageTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(bytes)
}

/// Decode a message body. The size check happens before parsing.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], max: usize) -> Result<T, IpcError> {
    if bytes.len() > max {
        return Err(IpcError::MessageTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(serde_json::from_slice(bytes)?)
}
