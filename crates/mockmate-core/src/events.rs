//! # Logical Events
//!
//! Application-level messages carried by one streaming channel. Each variant
//! owns a typed payload; on the wire an event is the adjacently tagged object
//! `{"type": "<kind>", "data": {...}}`.
//!
//! Ordering contract for one turn:
//!
//! `channel-opened → content-delta* → content-complete? → domain-terminal`
//!
//! `transport-error` may appear at any point, and `domain-terminal` may appear
//! without a preceding `content-complete` (a concluding turn streams no text).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::SessionId;
use crate::interview::TurnOutcome;

/// One parsed, typed application-level message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LogicalEvent {
    /// The producer allocated or validated the domain session.
    #[serde(rename = "channel-opened")]
    ChannelOpened {
        /// Opaque session identifier.
        session_id: SessionId,
    },

    /// One incremental text fragment.
    #[serde(rename = "content-delta")]
    ContentDelta {
        /// The fragment.
        content: String,
    },

    /// The full accumulated text; a consistency checkpoint for the deltas.
    #[serde(rename = "content-complete")]
    ContentComplete {
        /// Authoritative total.
        total_content: String,
    },

    /// The business outcome of the turn is final. No further content events
    /// follow for this turn.
    #[serde(rename = "domain-terminal")]
    DomainTerminal(TurnOutcome),

    /// Something went wrong. Also synthesized locally for malformed frames,
    /// unknown kinds, and dropped connections.
    #[serde(rename = "transport-error")]
    TransportError {
        /// Human-readable description.
        message: String,
        /// Where the failure originated.
        #[serde(default)]
        kind: TransportErrorKind,
        /// Raw payload of a frame that could not be mapped to a known kind.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<Value>,
    },
}

impl LogicalEvent {
    /// A `transport-error` originating from the connection or the producer.
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            kind: TransportErrorKind::Transport,
            raw: None,
        }
    }

    /// A `transport-error` synthesized for a frame whose body did not parse.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            kind: TransportErrorKind::ParseError,
            raw: None,
        }
    }

    /// A `transport-error` synthesized for a well-formed frame of unknown kind.
    pub fn unknown_kind(kind: &str, raw: Value) -> Self {
        Self::TransportError {
            message: format!("unrecognized event kind '{kind}'"),
            kind: TransportErrorKind::UnknownKind,
            raw: Some(raw),
        }
    }

    /// The wire kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ChannelOpened { .. } => EventKind::ChannelOpened,
            Self::ContentDelta { .. } => EventKind::ContentDelta,
            Self::ContentComplete { .. } => EventKind::ContentComplete,
            Self::DomainTerminal(_) => EventKind::DomainTerminal,
            Self::TransportError { .. } => EventKind::TransportError,
        }
    }
}

/// Origin of a `transport-error` event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportErrorKind {
    /// Connection failure, non-success status, or a failure reported by the producer.
    #[default]
    Transport,
    /// A complete frame whose body was not valid JSON for its kind.
    ParseError,
    /// A well-formed frame whose `type` is not recognized.
    UnknownKind,
}

impl TransportErrorKind {
    /// Malformed or unknown frames are skipped; the channel stays usable.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::ParseError | Self::UnknownKind)
    }

    /// Short label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::ParseError => "parse-error",
            Self::UnknownKind => "unknown-kind",
        }
    }
}

/// The recognized `type` strings of this protocol instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `channel-opened`
    ChannelOpened,
    /// `content-delta`
    ContentDelta,
    /// `content-complete`
    ContentComplete,
    /// `domain-terminal`
    DomainTerminal,
    /// `transport-error`
    TransportError,
}

impl EventKind {
    /// All recognized kinds.
    pub const ALL: [Self; 5] = [
        Self::ChannelOpened,
        Self::ContentDelta,
        Self::ContentComplete,
        Self::DomainTerminal,
        Self::TransportError,
    ];

    /// The wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChannelOpened => "channel-opened",
            Self::ContentDelta => "content-delta",
            Self::ContentComplete => "content-complete",
            Self::DomainTerminal => "domain-terminal",
            Self::TransportError => "transport-error",
        }
    }

    /// Look up a wire string.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
