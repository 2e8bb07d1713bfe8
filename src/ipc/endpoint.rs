//! Private local-socket endpoints between the core and its workers.
//!
//! Each worker gets a fresh endpoint name. The core listens before spawning
//! the worker process; the worker connects using the name from its environment.
//! Namespaced sockets are used where the platform has them, socket files in
//! the temp directory elsewhere.

use std::io;
use std::path::PathBuf;

use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, ListenerOptions, Name, NameType, ToFsName, ToNsName,
};
use uuid::Uuid;

/// Environment variable carrying the endpoint name into a worker.
pub const ENDPOINT_ENV: &str = "DEVSCHED_ENDPOINT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    printname: String,
}

impl Endpoint {
    /// Fresh, collision-free endpoint name tagged with `tag`.
    pub fn unique(tag: &str) -> Self {
        Self {
            printname: format!("devsched-{tag}-{}.sock", Uuid::new_v4().simple()),
        }
    }

    pub fn from_printname(printname: impl Into<String>) -> Self {
        Self {
            printname: printname.into(),
        }
    }

    /// Endpoint named by [`ENDPOINT_ENV`].
    pub fn from_env() -> Option<Self> {
        std::env::var(ENDPOINT_ENV).ok().map(Self::from_printname)
    }

    pub fn as_str(&self) -> &str {
        &self.printname
    }

    fn name(&self) -> io::Result<Name<'static>> {
        if GenericNamespaced::is_supported() {
            self.printname.clone().to_ns_name::<GenericNamespaced>()
        } else {
            self.socket_path().to_fs_name::<GenericFilePath>()
        }
    }

    fn socket_path(&self) -> PathBuf {
        std::env::temp_dir().join(&self.printname)
    }

    /// Bind a listener on this endpoint.
    pub fn listen(&self) -> io::Result<Listener> {
        ListenerOptions::new().name(self.name()?).create_tokio()
    }

    /// Connect to a listener bound on this endpoint.
    pub async fn connect(&self) -> io::Result<Stream> {
        Stream::connect(self.name()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interprocess::local_socket::tokio::prelude::*;
    use crate::ipc::frame::{FrameReader, FrameWriter};
    use crate::ipc::protocol::{WorkerOutbound, DEFAULT_MAX_FRAME};
    use crate::task::TaskOutcome;

    #[test]
    fn unique_names_differ() {
        let a = Endpoint::unique("t");
        let b = Endpoint::unique("t");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("devsched-t-"));
    }

    #[tokio::test]
    async fn listener_and_client_exchange_frames() {
        let endpoint = Endpoint::unique("test");
        let listener = endpoint.listen().unwrap();

        let client_endpoint = endpoint.clone();
        let client = tokio::spawn(async move {
            let stream = client_endpoint.connect().await.unwrap();
            let (_, w) = tokio::io::split(stream);
            let mut writer = FrameWriter::new(w, DEFAULT_MAX_FRAME);
            writer
                .send(&WorkerOutbound::Finished {
                    outcome: TaskOutcome::Empty,
                })
                .await
                .unwrap();
        });

        let stream = listener.accept().await.unwrap();
        let (r, _w) = tokio::io::split(stream);
        let mut reader = FrameReader::new(r, DEFAULT_MAX_FRAME);
        let msg: Option<WorkerOutbound> = reader.recv().await.unwrap();
        assert_eq!(
            msg,
            Some(WorkerOutbound::Finished {
                outcome: TaskOutcome::Empty
            })
        );
        client.await.unwrap();
    }
}
