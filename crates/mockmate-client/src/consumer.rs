//! # Stream Consumer
//!
//! Turns a [`ByteSource`] into a lazy, finite sequence of [`LogicalEvent`]s.
//!
//! Each pulled chunk goes into the channel's [`FrameBuffer`]; every complete
//! frame is decoded and yielded before the next pull, in arrival order. The
//! sequence ends after the terminator frame, after a synthesized
//! `transport-error`, or on cancellation. The source is released on every one
//! of those exits.
//!
//! Failures never end the sequence silently:
//!
//! | Situation | Last event |
//! |---|---|
//! | source fails | `transport-error` with the failure message |
//! | end-of-input before the terminator | `transport-error` |
//! | partial frame over the size limit | `transport-error` |
//! | too many malformed frames in a row | `transport-error` |

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use mockmate_core::{LogicalEvent, TransportErrorKind};
use mockmate_protocol::{DEFAULT_MAX_FRAME_BYTES, FrameBuffer, RawFrame, decode, decode_data};
use mockmate_settings::ClientSettings;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::FRAMES_MALFORMED_TOTAL;
use crate::source::{ByteSource, SourceGuard};

/// Limits applied while decoding one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumerLimits {
    /// Upper bound for one partial frame.
    pub max_frame_bytes: usize,
    /// Malformed frames in a row tolerated before the channel is abandoned.
    pub max_consecutive_parse_errors: u32,
}

impl Default for ConsumerLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_consecutive_parse_errors: 8,
        }
    }
}

impl ConsumerLimits {
    /// Limits from the client settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_frame_bytes: settings.max_frame_bytes,
            max_consecutive_parse_errors: settings.max_consecutive_parse_errors,
        }
    }
}

/// Boxed event sequence of one channel.
pub type EventStream = Pin<Box<dyn Stream<Item = LogicalEvent> + Send>>;

/// One open channel: the byte source, its cancellation token, and the event
/// sequence reading from it.
///
/// Polling after the sequence ended, or after cancellation, yields `None`.
pub struct ChannelHandle {
    token: CancellationToken,
    events: Option<EventStream>,
}

impl ChannelHandle {
    /// Start consuming `source`. Nothing is pulled until the handle is polled.
    pub fn open<S>(source: S, limits: ConsumerLimits) -> Self
    where
        S: ByteSource + 'static,
    {
        let token = CancellationToken::new();
        let guard = SourceGuard::new(source);
        let events: EventStream = Box::pin(consume(guard, limits, token.clone()));
        Self {
            token,
            events: Some(events),
        }
    }

    /// Stop the channel and release its byte source before returning.
    /// Calling it again does nothing.
    pub fn cancel(&mut self) {
        self.token.cancel();
        if self.events.take().is_some() {
            debug!("channel cancelled and released");
        }
    }

    /// Token that cancels this channel from elsewhere. The source is released
    /// on the next poll.
    pub fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Whether the event sequence is over and the source released.
    pub fn is_closed(&self) -> bool {
        self.events.is_none()
    }
}

impl Stream for ChannelHandle {
    type Item = LogicalEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.token.is_cancelled() {
            this.events = None;
            return Poll::Ready(None);
        }
        let Some(events) = this.events.as_mut() else {
            return Poll::Ready(None);
        };
        match events.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.events = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

fn is_malformed(event: &LogicalEvent) -> bool {
    matches!(
        event,
        LogicalEvent::TransportError {
            kind: TransportErrorKind::ParseError,
            ..
        }
    )
}

fn consume<S>(
    source: SourceGuard<S>,
    limits: ConsumerLimits,
    token: CancellationToken,
) -> impl Stream<Item = LogicalEvent> + Send + 'static
where
    S: ByteSource + 'static,
{
    async_stream::stream! {
        let mut source = source;
        let mut buffer = FrameBuffer::with_max_frame_bytes(limits.max_frame_bytes);
        let mut malformed_run = 0u32;

        'channel: loop {
            let pulled = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("channel cancelled while waiting for data");
                    break 'channel;
                }
                pulled = source.next_chunk() => pulled,
            };

            let chunk = match pulled {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    let mut terminated = false;
                    match buffer.take_remainder() {
                        Some(RawFrame::Terminator) => terminated = true,
                        Some(RawFrame::Data(data)) => yield decode_data(&data),
                        Some(RawFrame::Invalid(message)) => yield LogicalEvent::parse_error(message),
                        Some(RawFrame::Empty) | None => {}
                    }
                    if !terminated {
                        warn!(buffered = buffer.len(), "channel ended before the terminator frame");
                        yield LogicalEvent::transport_error("stream ended before the terminator frame");
                    }
                    break 'channel;
                }
                Err(e) => {
                    warn!(category = e.category(), error = %e, "byte source failed");
                    yield LogicalEvent::transport_error(e.to_string());
                    break 'channel;
                }
            };

            if let Err(e) = buffer.push(&chunk) {
                warn!(error = %e, "partial frame exceeds limit");
                yield LogicalEvent::transport_error(e.to_string());
                break 'channel;
            }

            let mut decoded = decode(buffer.as_bytes());
            buffer.consume(decoded.consumed);
            if decoded.terminated {
                let residual = decode(buffer.as_bytes());
                if !residual.events.is_empty() {
                    debug!(count = residual.events.len(), "flushing frames buffered after the terminator");
                }
                buffer.consume(residual.consumed);
                decoded.events.extend(residual.events);
            }

            for event in decoded.events {
                if token.is_cancelled() {
                    break 'channel;
                }
                if is_malformed(&event) {
                    malformed_run += 1;
                    metrics::counter!(FRAMES_MALFORMED_TOTAL).increment(1);
                } else {
                    malformed_run = 0;
                }
                yield event;
                if malformed_run > limits.max_consecutive_parse_errors {
                    warn!(malformed_run, "too many malformed frames in a row");
                    yield LogicalEvent::transport_error(format!(
                        "{malformed_run} malformed frames in a row"
                    ));
                    break 'channel;
                }
            }

            if decoded.terminated {
                debug!(unread = buffer.len(), "terminator received");
                break 'channel;
            }
        }

        drop(source);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
