//! # Parse Buffer
//!
//! [`FrameBuffer`] owns the bytes of one channel that have arrived but not yet
//! formed a complete frame. Bytes are appended as they arrive and only a fully
//! delimited prefix is ever removed, so nothing is lost or parsed early.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::frame::{self, DELIMITER, RawFrame};

/// Default upper bound for a single partial frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Buffer failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Buffered bytes without a delimiter exceed the configured limit.
    #[error("partial frame of {buffered} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// Bytes currently buffered.
        buffered: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Append-only byte buffer for one channel.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_frame_bytes: usize,
    // Offset just past the last delimiter seen in `buf`.
    frame_start: usize,
    // Where the next delimiter search resumes.
    scan_from: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Empty buffer with [`DEFAULT_MAX_FRAME_BYTES`].
    pub fn new() -> Self {
        Self::with_max_frame_bytes(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Empty buffer with a custom partial-frame limit.
    pub fn with_max_frame_bytes(max_frame_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8192),
            max_frame_bytes,
            frame_start: 0,
            scan_from: 0,
        }
    }

    /// Append a chunk, dropping carriage returns.
    ///
    /// Fails once the bytes after the last delimiter grow past the limit; the
    /// chunk is still appended so the caller can inspect what arrived.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        self.buf.reserve(chunk.len());
        for segment in chunk.split(|&b| b == b'\r') {
            self.buf.extend_from_slice(segment);
        }

        let tail = self.partial_len();
        if tail > self.max_frame_bytes {
            return Err(FrameError::FrameTooLarge {
                buffered: tail,
                limit: self.max_frame_bytes,
            });
        }
        Ok(())
    }

    /// Bytes buffered after the last complete delimiter. Only bytes not yet
    /// scanned are searched, so a frame arriving in many small chunks costs
    /// linear time.
    fn partial_len(&mut self) -> usize {
        while let Some(at) = frame::find_delimiter(&self.buf, self.scan_from) {
            self.frame_start = at + DELIMITER.len();
            self.scan_from = self.frame_start;
        }
        // A delimiter may straddle the end of this chunk and the next.
        let overlap = DELIMITER.len() - 1;
        self.scan_from = self.scan_from.max(self.buf.len().saturating_sub(overlap));
        self.buf.len() - self.frame_start
    }

    fn discard_prefix(&mut self, n: usize) {
        self.frame_start = self.frame_start.saturating_sub(n);
        self.scan_from = self.scan_from.saturating_sub(n).max(self.frame_start);
    }

    /// Everything buffered so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Discard a decoded prefix.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
        self.discard_prefix(n);
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Pop the next complete frame, if one is fully buffered.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        let at = frame::find_delimiter(&self.buf, 0)?;
        let body = self.buf.split_to(at + DELIMITER.len());
        self.discard_prefix(body.len());
        Some(frame::parse_frame(&body[..at]))
    }

    /// Treat whatever is left as one final frame. Used once the source has
    /// ended and no delimiter can arrive any more.
    pub fn take_remainder(&mut self) -> Option<RawFrame> {
        self.frame_start = 0;
        self.scan_from = 0;
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return None;
        }
        let body = self.buf.split();
        Some(frame::parse_frame(&body))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
