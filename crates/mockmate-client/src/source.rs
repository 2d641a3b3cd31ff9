//! # Byte Sources
//!
//! A [`ByteSource`] hands out raw chunks of one channel until end-of-input or
//! failure. Chunk boundaries carry no meaning.
//!
//! [`HttpByteSource`] reads a streaming response body with an idle timeout.
//! [`ChunkSource`] replays chunks from memory.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::errors::{ClientError, Result};

/// Pull-based source of raw channel bytes.
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk, `None` at end-of-input.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Release the underlying connection. Called exactly once, on every exit
    /// path of the consumer.
    fn release(&mut self);
}

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Streaming HTTP response body.
pub struct HttpByteSource {
    body: Option<BodyStream>,
    idle_timeout: Duration,
    received: usize,
}

impl HttpByteSource {
    /// Read `response` until end-of-body. A gap longer than `idle_timeout`
    /// between two chunks fails the source.
    pub fn new(response: reqwest::Response, idle_timeout: Duration) -> Self {
        Self {
            body: Some(Box::pin(response.bytes_stream())),
            idle_timeout,
            received: 0,
        }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };
        match tokio::time::timeout(self.idle_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => {
                self.received += chunk.len();
                Ok(Some(chunk))
            }
            Ok(Some(Err(e))) => Err(ClientError::Http(e)),
            Ok(None) => Ok(None),
            Err(_) => Err(ClientError::IdleTimeout(self.idle_timeout)),
        }
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            debug!(bytes = self.received, "http body released");
        }
    }
}

/// In-memory source replaying a fixed list of chunks and failures.
pub struct ChunkSource {
    chunks: VecDeque<Result<Bytes>>,
    hang_at_end: bool,
    released: Arc<AtomicBool>,
}

impl ChunkSource {
    /// Source yielding `chunks` in order, then end-of-input.
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes>>,
    {
        Self {
            chunks: chunks.into_iter().collect(),
            hang_at_end: false,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Source yielding `data` split into pieces of `size` bytes.
    pub fn split(data: &[u8], size: usize) -> Self {
        Self::new(
            data.chunks(size.max(1))
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    /// Never reach end-of-input once the chunks run out.
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hang_at_end = true;
        self
    }

    /// Flag set once the consumer released this source.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

#[async_trait]
impl ByteSource for ChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.chunks.pop_front() {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None if self.hang_at_end => {
                futures::future::pending::<()>().await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.chunks.clear();
        self.released.store(true, Ordering::Release);
    }
}

/// Releases the wrapped source when dropped.
pub(crate) struct SourceGuard<S: ByteSource> {
    source: S,
}

impl<S: ByteSource> SourceGuard<S> {
    pub(crate) fn new(source: S) -> Self {
        Self { source }
    }

    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.source.next_chunk().await
    }
}

impl<S: ByteSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.release();
    }
}
