//! # Channel Producer
//!
//! Drives one turn and turns it into wire frames.
//!
//! ```text
//! OPENING ──► STREAMING ──► CLOSING ──► CLOSED
//!    │                         ▲
//!    └─────────(failure)───────┘
//! ```
//!
//! - `OPENING`: the session collaborator validates or allocates the session;
//!   `channel-opened` is emitted on success.
//! - `STREAMING`: fragments are pulled from the generator one at a time, each
//!   non-empty one emitted as `content-delta` and accumulated, with a pacing
//!   delay between deltas. The accumulation is emitted as `content-complete`.
//! - The domain step (store question or conclude) runs after the content
//!   stream and is emitted as `domain-terminal`.
//! - Any failure emits one `transport-error` and goes straight to `CLOSING`.
//! - `CLOSING` emits the terminator frame. Every path passes through it once.
//!
//! [`ChannelProducer::respond_sync`] runs the same turn without streaming for
//! the fallback endpoints.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use mockmate_core::{DomainError, LogicalEvent, SessionId, TurnOutcome, TurnRequest};
use mockmate_protocol::{encode, encode_terminator};
use tracing::{debug, info, warn};

use crate::generation::TextGenerator;
use crate::metrics::{CHANNEL_ERRORS_TOTAL, CHANNELS_OPENED_TOTAL};
use crate::sessions::{NextStep, SessionCollaborator};

/// Lifecycle phase of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Session being allocated or validated.
    Opening,
    /// Content fragments being emitted.
    Streaming,
    /// Terminator being emitted.
    Closing,
    /// Nothing more will be emitted.
    Closed,
}

impl fmt::Display for ChannelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Opening => "opening",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

/// Runs turns against the session and generation collaborators.
#[derive(Clone)]
pub struct ChannelProducer {
    sessions: Arc<dyn SessionCollaborator>,
    generator: Arc<dyn TextGenerator>,
    pacing: Duration,
}

impl ChannelProducer {
    /// Producer with the given pacing delay between deltas.
    pub fn new(
        sessions: Arc<dyn SessionCollaborator>,
        generator: Arc<dyn TextGenerator>,
        pacing: Duration,
    ) -> Self {
        Self {
            sessions,
            generator,
            pacing,
        }
    }

    /// The session collaborator.
    pub fn sessions(&self) -> &Arc<dyn SessionCollaborator> {
        &self.sessions
    }

    /// Logical events of one turn, without the terminator.
    pub fn events(&self, request: TurnRequest) -> impl Stream<Item = LogicalEvent> + Send + 'static {
        let sessions = Arc::clone(&self.sessions);
        let generator = Arc::clone(&self.generator);
        let pacing = self.pacing;

        async_stream::stream! {
            let mut phase = ChannelPhase::Opening;
            debug!(%phase, path = request.stream_path(), "channel opening");

            let opened = match sessions.begin_turn(&request).await {
                Ok(plan) => {
                    metrics::counter!(CHANNELS_OPENED_TOTAL).increment(1);
                    yield LogicalEvent::ChannelOpened { session_id: plan.session_id.clone() };
                    Some(plan)
                }
                Err(e) => {
                    yield failure("session", &e.to_string());
                    None
                }
            };

            if let Some(plan) = opened {
                let session_id = plan.session_id;
                let mut failed = false;
                match plan.next {
                    NextStep::Replay(outcome) => {
                        if let Some(text) = outcome.prompt_text() {
                            yield LogicalEvent::ContentDelta { content: text.to_string() };
                            yield LogicalEvent::ContentComplete { total_content: text.to_string() };
                        }
                        yield LogicalEvent::DomainTerminal(outcome);
                    }
                    NextStep::Conclude => {
                        match sessions.conclude_turn(&session_id).await {
                            Ok(outcome) => yield LogicalEvent::DomainTerminal(outcome),
                            Err(e) => {
                                yield failure("session", &e.to_string());
                                failed = true;
                            }
                        }
                    }
                    NextStep::Ask(ask) => {
                        phase = ChannelPhase::Streaming;
                        debug!(%phase, session_id = %session_id, "channel streaming");

                        let mut accumulated = String::new();
                        match generator.stream(&ask).await {
                            Ok(mut fragments) => {
                                while let Some(item) = fragments.next().await {
                                    match item {
                                        Ok(fragment) if fragment.is_empty() => {}
                                        Ok(fragment) => {
                                            if !accumulated.is_empty() && !pacing.is_zero() {
                                                tokio::time::sleep(pacing).await;
                                            }
                                            accumulated.push_str(&fragment);
                                            yield LogicalEvent::ContentDelta { content: fragment };
                                        }
                                        Err(e) => {
                                            warn!(session_id = %session_id, category = e.category(), error = %e, "generation failed mid-stream");
                                            yield failure("generation", &e.to_string());
                                            failed = true;
                                            break;
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(session_id = %session_id, category = e.category(), error = %e, "generation failed to start");
                                yield failure("generation", &e.to_string());
                                failed = true;
                            }
                        }

                        if !failed {
                            if accumulated.trim().is_empty() {
                                yield failure("generation", "generator produced no text");
                                failed = true;
                            } else {
                                yield LogicalEvent::ContentComplete { total_content: accumulated.clone() };
                                match sessions.continue_turn(&session_id, &accumulated).await {
                                    Ok(outcome) => yield LogicalEvent::DomainTerminal(outcome),
                                    Err(e) => {
                                        yield failure("session", &e.to_string());
                                        failed = true;
                                    }
                                }
                            }
                        }
                    }
                }
                if failed && matches!(request, TurnRequest::Start(_)) {
                    sessions.abandon(&session_id).await;
                }
            }

            phase = ChannelPhase::Closing;
            debug!(%phase, "channel closing");
        }
    }

    /// Wire frames of one turn: the encoded events followed by exactly one
    /// terminator.
    pub fn frames(&self, request: TurnRequest) -> impl Stream<Item = Bytes> + Send + 'static {
        self.events(request)
            .map(|event| encode(&event))
            .chain(futures::stream::once(async {
                debug!(phase = %ChannelPhase::Closed, "channel closed");
                encode_terminator()
            }))
    }

    /// Run one turn without streaming and return its outcome.
    pub async fn respond_sync(&self, request: &TurnRequest) -> Result<TurnOutcome, DomainError> {
        let plan = self.sessions.begin_turn(request).await?;
        let outcome = match self.finish_sync(plan.next, &plan.session_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if matches!(request, TurnRequest::Start(_)) {
                    self.sessions.abandon(&plan.session_id).await;
                }
                return Err(e);
            }
        };
        info!(session_id = %plan.session_id, completed = outcome.completed, "sync turn finished");
        Ok(outcome)
    }

    async fn finish_sync(
        &self,
        next: NextStep,
        session_id: &SessionId,
    ) -> Result<TurnOutcome, DomainError> {
        match next {
            NextStep::Replay(outcome) => Ok(outcome),
            NextStep::Conclude => self.sessions.conclude_turn(session_id).await,
            NextStep::Ask(ask) => {
                let text = self
                    .generator
                    .complete(&ask)
                    .await
                    .map_err(|e| DomainError::Generation(e.to_string()))?;
                self.sessions.continue_turn(session_id, &text).await
            }
        }
    }
}

fn failure(kind: &'static str, message: &str) -> LogicalEvent {
    metrics::counter!(CHANNEL_ERRORS_TOTAL, "kind" => kind).increment(1);
    warn!(kind, error = message, "channel failed");
    LogicalEvent::transport_error(message)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
