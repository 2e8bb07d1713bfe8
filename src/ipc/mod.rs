//! Inter-process channels for the scheduler.
//!
//! Two channels exist: the handle talks to the core over the core's
//! stdin/stdout pipes, and the core talks to each worker over a private
//! local socket. Both use the same framing and JSON message schema.

pub mod endpoint;
pub mod frame;
pub mod protocol;

pub use endpoint::{Endpoint, ENDPOINT_ENV};
pub use frame::{FrameReader, FrameWriter};
pub use protocol::{
    encode, CoreInbound, CoreOutbound, IpcError, WorkerInbound, WorkerOutbound, DEFAULT_MAX_FRAME,
};
