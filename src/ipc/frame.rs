// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Length-prefixed framing over any async byte stream.
//!
//! Wire format: `[len: u32-le][json body]`, one message per frame.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use super::protocol::{decode, encode, IpcError};

/// Codec shared by both directions of every channel.
pub fn codec(max_frame: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .little_endian()
        .max_frame_length(max_frame)
        .new_codec()
}

/// Receiving half of a framed channel.
pub struct FrameReader<R> {
    inner: FramedRead<R, LengthDelimitedCodec>,
    max_frame: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R, max_frame: usize) -> Self {
        Self {
            inner: FramedRead::new(io, codec(max_frame)),
            max_frame,
        }
    }

    /// Next message, or `None` on a clean end of stream.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, IpcError> {
        match self.inner.next().await {
            None => Ok(None),
            Some(frame) => decode(&frame?, self.max_frame).map(Some),
        }
    }
}

/// Sending half of a framed channel.
pub struct FrameWriter<W> {
    inner: FramedWrite<W, LengthDelimitedCodec>,
    max_frame: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(io: W, max_frame: usize) -> Self {
        Self {
            inner: FramedWrite::new(io, codec(max_frame)),
            max_frame,
        }
    }

    /// Encode and send one message, flushing it to the underlying stream.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), IpcError> {
        let body = encode(message, self.max_frame)?;
        self.send_frame(Bytes::from(body)).await
    }

    /// Send a body that was already encoded with [`encode`].
    pub async fn send_frame(&mut self, body: Bytes) -> Result<(), IpcError> {
        if body.len() > self.max_frame {
            return Err(IpcError::MessageTooLarge {
                size: body.len(),
                max: self.max_frame,
            });
        }
        self.inner.send(body).await?;
        Ok(())
    }

    /// Flush and shut down the write side, signalling end of stream to the peer.
    pub async fn close(mut self) -> Result<(), IpcError> {
        SinkExt::<Bytes>::close(&mut self.inner).await?;
        Ok(())
    }
}
