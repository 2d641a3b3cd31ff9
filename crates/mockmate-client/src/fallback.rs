//! # Fallback Controller
//!
//! Runs one turn: stream it, reveal its text through the playback scheduler,
//! and on failure re-issue the same request through the synchronous endpoint.
//!
//! - `parse-error` and `unknown-kind` errors are skipped; the channel goes on.
//! - Any other `transport-error`, a failed stream open, or a stream that ends
//!   without a `domain-terminal` triggers the fallback. Once the
//!   `domain-terminal` arrived the turn is done on the server, so a later
//!   failure only closes the channel.
//! - The fallback discards what was revealed, makes exactly one synchronous
//!   attempt, and reveals the returned prompt at the same cadence.
//! - A second failure is returned as [`TurnError::FallbackFailed`].
//!
//! A turn reports finished only after the reveal cursor caught up.

use futures::StreamExt;
use mockmate_core::{LogicalEvent, SessionId, TurnOutcome, TurnRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consumer::ChannelHandle;
use crate::errors::TurnError;
use crate::metrics::FALLBACKS_TOTAL;
use crate::playback::PlaybackScheduler;
use crate::ticks::TickSource;
use crate::transport::TurnTransport;

/// Receives what the turn shows while it runs. Every method defaults to
/// doing nothing.
pub trait TurnObserver: Send {
    /// The server opened the channel for this session.
    fn on_opened(&mut self, _session_id: &SessionId) {}

    /// One more char is revealed.
    fn on_reveal(&mut self, _ch: char) {}

    /// The revealed text is withdrawn before the fallback runs.
    fn on_discard(&mut self, _revealed: &str) {}

    /// The stream failed for `reason` and the synchronous request is issued.
    fn on_fallback(&mut self, _reason: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TurnObserver for NullObserver {}

/// Which path delivered the outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The streaming channel.
    Stream,
    /// The synchronous fallback.
    Fallback,
}

/// Result of one finished turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    /// The domain outcome.
    pub outcome: TurnOutcome,
    /// Path that delivered it.
    pub delivery: Delivery,
    /// Text revealed by the end of the turn.
    pub revealed: String,
}

enum StreamEnd {
    Finished(TurnOutcome),
    Failed(String),
    Cancelled,
}

/// Streams turns with a single synchronous fallback.
pub struct FallbackController<T, K> {
    transport: T,
    ticks: K,
    cancel: CancellationToken,
}

impl<T, K> FallbackController<T, K>
where
    T: TurnTransport,
    K: TickSource,
{
    /// Controller over `transport`, revealing text on `ticks`.
    pub fn new(transport: T, ticks: K) -> Self {
        Self {
            transport,
            ticks,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that cancels the running and every later turn.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The tick source.
    pub fn ticks(&self) -> &K {
        &self.ticks
    }

    /// Run one turn to completion.
    pub async fn run_turn(
        &mut self,
        request: &TurnRequest,
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnReport, TurnError> {
        let mut scheduler = PlaybackScheduler::new();

        let opened = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(TurnError::Cancelled),
            opened = self.transport.open_stream(request) => opened,
        };

        let reason = match opened {
            Ok(channel) => match self.stream_turn(channel, &mut scheduler, observer).await {
                StreamEnd::Finished(outcome) => {
                    info!(completed = outcome.completed, "turn finished over stream");
                    return Ok(TurnReport {
                        outcome,
                        delivery: Delivery::Stream,
                        revealed: scheduler.revealed_text().to_string(),
                    });
                }
                StreamEnd::Failed(reason) => reason,
                StreamEnd::Cancelled => return Err(TurnError::Cancelled),
            },
            Err(e) => {
                warn!(category = e.category(), error = %e, "stream could not be opened");
                e.to_string()
            }
        };

        self.fallback(request, reason, &mut scheduler, observer).await
    }

    async fn stream_turn(
        &mut self,
        mut channel: ChannelHandle,
        scheduler: &mut PlaybackScheduler,
        observer: &mut dyn TurnObserver,
    ) -> StreamEnd {
        let mut session_id: Option<SessionId> = None;
        let mut outcome: Option<TurnOutcome> = None;
        let mut stream_done = false;

        loop {
            if stream_done && !scheduler.is_ticking() {
                break;
            }
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    channel.cancel();
                    scheduler.cancel();
                    return StreamEnd::Cancelled;
                }
                event = channel.next(), if !stream_done => {
                    let Some(event) = event else {
                        stream_done = true;
                        continue;
                    };
                    match event {
                        LogicalEvent::ChannelOpened { session_id: id } => {
                            observer.on_opened(&id);
                            session_id = Some(id);
                        }
                        LogicalEvent::ContentDelta { content } => scheduler.on_delta(&content),
                        LogicalEvent::ContentComplete { total_content } => {
                            scheduler.on_complete(&total_content);
                        }
                        LogicalEvent::DomainTerminal(result) => {
                            scheduler.on_domain_terminal();
                            outcome = Some(result);
                        }
                        LogicalEvent::TransportError { message, kind, .. } if kind.is_recoverable() => {
                            warn!(kind = kind.as_str(), error = %message, "skipping unusable frame");
                        }
                        LogicalEvent::TransportError { message, .. } if outcome.is_some() => {
                            warn!(error = %message, "channel failed after the turn outcome arrived, keeping it");
                            channel.cancel();
                            stream_done = true;
                        }
                        LogicalEvent::TransportError { message, .. } => {
                            channel.cancel();
                            return StreamEnd::Failed(message);
                        }
                    }
                }
                () = self.ticks.tick(), if scheduler.is_ticking() => {
                    if let Some(ch) = scheduler.tick() {
                        observer.on_reveal(ch);
                    }
                }
                else => break,
            }
        }

        match outcome {
            Some(mut outcome) => {
                if outcome.session_id.is_none() {
                    outcome.session_id = session_id;
                }
                StreamEnd::Finished(outcome)
            }
            None => StreamEnd::Failed("stream ended without a turn outcome".to_string()),
        }
    }

    async fn fallback(
        &mut self,
        request: &TurnRequest,
        reason: String,
        scheduler: &mut PlaybackScheduler,
        observer: &mut dyn TurnObserver,
    ) -> Result<TurnReport, TurnError> {
        warn!(path = request.sync_path(), reason = %reason, "stream failed, falling back to synchronous request");
        scheduler.cancel();
        observer.on_discard(scheduler.revealed_text());
        observer.on_fallback(&reason);

        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(TurnError::Cancelled),
            sent = self.transport.send_sync(request) => sent,
        };
        let outcome = match sent {
            Ok(outcome) => {
                metrics::counter!(FALLBACKS_TOTAL, "outcome" => "recovered").increment(1);
                outcome
            }
            Err(e) => {
                metrics::counter!(FALLBACKS_TOTAL, "outcome" => "failed").increment(1);
                warn!(category = e.category(), error = %e, "fallback failed");
                return Err(TurnError::FallbackFailed {
                    stream: reason,
                    fallback: e,
                });
            }
        };

        scheduler.begin_turn();
        if let Some(text) = outcome.prompt_text() {
            scheduler.on_complete(text);
        }
        scheduler.on_domain_terminal();
        while scheduler.is_ticking() {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    scheduler.cancel();
                    return Err(TurnError::Cancelled);
                }
                () = self.ticks.tick() => {
                    if let Some(ch) = scheduler.tick() {
                        observer.on_reveal(ch);
                    }
                }
            }
        }
        debug!(completed = outcome.completed, "turn finished over fallback");

        Ok(TurnReport {
            outcome,
            delivery: Delivery::Fallback,
            revealed: scheduler.revealed_text().to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
