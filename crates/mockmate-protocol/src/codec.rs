//! # Frame Codec
//!
//! [`encode`] turns one [`LogicalEvent`] into one wire frame. [`decode`] scans a
//! normalized buffer for complete frames and maps each to an event.
//!
//! Decoding never fails as a whole. A body that is not JSON, or not valid for
//! its kind, becomes a `transport-error` of kind `parse-error`. A well-formed
//! body with an unknown `type` becomes a `transport-error` of kind
//! `unknown-kind` carrying the raw payload, and is logged at `warn`.

use bytes::Bytes;
use mockmate_core::{EventKind, LogicalEvent};
use serde_json::Value;
use tracing::warn;

use crate::frame::{self, DELIMITER, RawFrame};

const TERMINATOR_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Serialize one event to `data: {json}\n\n`.
pub fn encode(event: &LogicalEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        warn!(kind = %event.kind(), error = %e, "event failed to serialize");
        serde_json::json!({
            "type": EventKind::TransportError.as_str(),
            "data": { "message": format!("event failed to serialize: {e}") },
        })
        .to_string()
    });

    let mut out = Vec::with_capacity(json.len() + 8);
    out.extend_from_slice(b"data: ");
    out.extend_from_slice(json.as_bytes());
    out.extend_from_slice(DELIMITER);
    Bytes::from(out)
}

/// The sentinel frame that closes a channel.
pub fn encode_terminator() -> Bytes {
    Bytes::from_static(TERMINATOR_FRAME)
}

/// Result of one [`decode`] pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Decoded {
    /// Events in frame order.
    pub events: Vec<LogicalEvent>,
    /// Length of the fully processed prefix. Bytes past it are untouched.
    pub consumed: usize,
    /// Whether the terminator frame was reached. Scanning stops there.
    pub terminated: bool,
}

/// Decode every complete frame at the front of `buf`.
pub fn decode(buf: &[u8]) -> Decoded {
    let mut decoded = Decoded::default();

    while let Some(at) = frame::find_delimiter(buf, decoded.consumed) {
        let body = &buf[decoded.consumed..at];
        decoded.consumed = at + DELIMITER.len();

        match frame::parse_frame(body) {
            RawFrame::Terminator => {
                decoded.terminated = true;
                break;
            }
            RawFrame::Data(data) => decoded.events.push(decode_data(&data)),
            RawFrame::Invalid(message) => {
                warn!(bytes = body.len(), %message, "malformed frame");
                decoded.events.push(LogicalEvent::parse_error(message));
            }
            RawFrame::Empty => {}
        }
    }

    decoded
}

/// Map the data payload of one frame to an event.
pub fn decode_data(data: &str) -> LogicalEvent {
    let value: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, preview = preview(data), "malformed frame body");
            return LogicalEvent::parse_error(format!("malformed frame body: {e}"));
        }
    };

    let Some(kind) = value.get("type").and_then(Value::as_str).map(str::to_owned) else {
        warn!(preview = preview(data), "frame body has no 'type' field");
        return LogicalEvent::parse_error("frame body has no 'type' field");
    };

    if EventKind::from_wire(&kind).is_none() {
        warn!(kind = %kind, "unrecognized event kind");
        return LogicalEvent::unknown_kind(&kind, value);
    }

    match serde_json::from_value::<LogicalEvent>(value) {
        Ok(event) => event,
        Err(e) => {
            warn!(kind = %kind, error = %e, "invalid event payload");
            LogicalEvent::parse_error(format!("invalid '{kind}' payload: {e}"))
        }
    }
}

fn preview(data: &str) -> &str {
    match data.char_indices().nth(100) {
        Some((idx, _)) => &data[..idx],
        None => data,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameBuffer;
    use mockmate_core::{SessionId, TransportErrorKind, TurnOutcome};
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_events() -> Vec<LogicalEvent> {
        vec![
            LogicalEvent::ChannelOpened {
                session_id: SessionId::from_raw("s1"),
            },
            LogicalEvent::ContentDelta {
                content: "Hel".into(),
            },
            LogicalEvent::ContentDelta {
                content: "lo".into(),
            },
            LogicalEvent::ContentComplete {
                total_content: "Hello".into(),
            },
            LogicalEvent::DomainTerminal(TurnOutcome::pending(None)),
        ]
    }

    fn wire(events: &[LogicalEvent]) -> Vec<u8> {
        let mut out = Vec::new();
        for ev in events {
            out.extend_from_slice(&encode(ev));
        }
        out.extend_from_slice(&encode_terminator());
        out
    }

    /// Feed `bytes` split at `cuts` through a buffer, the way a consumer does.
    fn decode_chunked(bytes: &[u8], cuts: &[usize]) -> (Vec<LogicalEvent>, bool) {
        let mut buf = FrameBuffer::new();
        let mut events = Vec::new();
        let mut start = 0;
        let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
        points.sort_unstable();
        points.push(bytes.len());
        for end in points {
            if end < start {
                continue;
            }
            buf.push(&bytes[start..end]).unwrap();
            start = end;
            let decoded = decode(buf.as_bytes());
            buf.consume(decoded.consumed);
            events.extend(decoded.events);
            if decoded.terminated {
                return (events, true);
            }
        }
        (events, false)
    }

    #[test]
    fn encode_wire_shape() {
        let bytes = encode(&LogicalEvent::ContentDelta {
            content: "Hel".into(),
        });
        assert_eq!(
            &bytes[..],
            b"data: {\"type\":\"content-delta\",\"data\":{\"content\":\"Hel\"}}\n\n"
        );
    }

    #[test]
    fn terminator_literal() {
        assert_eq!(&encode_terminator()[..], b"data: [DONE]\n\n");
    }

    #[test]
    fn newlines_in_content_stay_inside_one_frame() {
        let ev = LogicalEvent::ContentDelta {
            content: "line one\n\nline two".into(),
        };
        let decoded = decode(&encode(&ev));
        assert_eq!(decoded.events, vec![ev]);
    }

    #[test]
    fn decode_full_turn() {
        let events = sample_events();
        let bytes = wire(&events);
        let decoded = decode(&bytes);
        assert_eq!(decoded.events, events);
        assert!(decoded.terminated);
        assert_eq!(decoded.consumed, bytes.len());
    }

    #[test]
    fn partial_frame_is_left_untouched() {
        let mut bytes = encode(&LogicalEvent::ContentDelta { content: "a".into() }).to_vec();
        let first = bytes.len();
        bytes.extend_from_slice(b"data: {\"type\":\"content-de");
        let decoded = decode(&bytes);
        assert_eq!(decoded.events.len(), 1);
        assert_eq!(decoded.consumed, first);
        assert!(!decoded.terminated);
    }

    #[test]
    fn scanning_stops_at_terminator() {
        let mut bytes = encode_terminator().to_vec();
        let term = bytes.len();
        bytes.extend_from_slice(&encode(&LogicalEvent::ContentDelta { content: "x".into() }));
        let decoded = decode(&bytes);
        assert!(decoded.terminated);
        assert!(decoded.events.is_empty());
        assert_eq!(decoded.consumed, term);
    }

    #[test]
    fn malformed_json_becomes_parse_error_and_scanning_continues() {
        let mut bytes = b"data: {not json\n\n".to_vec();
        bytes.extend_from_slice(&encode(&LogicalEvent::ContentDelta { content: "ok".into() }));
        let decoded = decode(&bytes);
        assert_eq!(decoded.events.len(), 2);
        match &decoded.events[0] {
            LogicalEvent::TransportError { kind, .. } => {
                assert_eq!(*kind, TransportErrorKind::ParseError);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(
            decoded.events[1],
            LogicalEvent::ContentDelta { content: "ok".into() }
        );
    }

    #[test]
    fn unknown_kind_keeps_raw_payload() {
        let ev = decode_data(r#"{"type":"question_chunk","data":{"content":"x"}}"#);
        match ev {
            LogicalEvent::TransportError { kind, raw, message } => {
                assert_eq!(kind, TransportErrorKind::UnknownKind);
                assert!(message.contains("question_chunk"));
                assert_eq!(raw.unwrap()["data"]["content"], "x");
            }
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_logged_at_warn() {
        let (logs, _guard) = mockmate_logging::capture_logs();
        let _ = decode_data(r#"{"type":"question_chunk","data":{}}"#);
        assert!(logs.has_event(tracing::Level::WARN, "unrecognized event kind"));
        let event = &logs.events()[0];
        assert_eq!(event.field("kind"), Some("question_chunk"));
    }

    #[test]
    fn known_kind_with_bad_payload_is_parse_error() {
        let ev = decode_data(r#"{"type":"content-delta","data":{"text":"x"}}"#);
        assert!(matches!(
            ev,
            LogicalEvent::TransportError {
                kind: TransportErrorKind::ParseError,
                ..
            }
        ));
    }

    #[test]
    fn missing_type_is_parse_error() {
        let ev = decode_data(r#"{"data":{}}"#);
        assert!(matches!(
            ev,
            LogicalEvent::TransportError {
                kind: TransportErrorKind::ParseError,
                ..
            }
        ));
    }

    #[test]
    fn producer_error_frame_decodes_as_transport_kind() {
        let ev = decode_data(r#"{"type":"transport-error","data":{"message":"Session not found"}}"#);
        assert_eq!(ev, LogicalEvent::transport_error("Session not found"));
    }

    #[test]
    fn keep_alive_comments_are_skipped() {
        let mut bytes = b": ping\n\n".to_vec();
        bytes.extend_from_slice(&wire(&[]));
        let decoded = decode(&bytes);
        assert!(decoded.events.is_empty());
        assert!(decoded.terminated);
    }

    #[test]
    fn split_exactly_at_delimiter() {
        let bytes = wire(&sample_events());
        let first = encode(&sample_events()[0]).len();
        let (events, terminated) = decode_chunked(&bytes, &[first - 1, first]);
        assert_eq!(events, sample_events());
        assert!(terminated);
    }

    #[test]
    fn crlf_stream_decodes_identically() {
        let bytes = wire(&sample_events());
        let crlf: Vec<u8> = bytes
            .iter()
            .flat_map(|&b| if b == b'\n' { vec![b'\r', b'\n'] } else { vec![b] })
            .collect();
        let (events, terminated) = decode_chunked(&crlf, &[3, 40, 41, 90]);
        assert_eq!(events, sample_events());
        assert!(terminated);
    }

    fn arb_event() -> impl Strategy<Value = LogicalEvent> {
        prop_oneof![
            "[a-z0-9]{1,12}".prop_map(|s| LogicalEvent::ChannelOpened {
                session_id: SessionId::from_raw(s)
            }),
            "\\PC{0,20}".prop_map(|content| LogicalEvent::ContentDelta { content }),
            "[ \\n\\ta-zé你好]{0,30}".prop_map(|total_content| LogicalEvent::ContentComplete {
                total_content
            }),
            any::<bool>().prop_map(|completed| LogicalEvent::DomainTerminal(TurnOutcome {
                completed,
                ..TurnOutcome::default()
            })),
            "\\PC{0,20}".prop_map(LogicalEvent::transport_error),
        ]
    }

    proptest! {
        #[test]
        fn chunk_boundaries_do_not_change_decoded_events(
            events in proptest::collection::vec(arb_event(), 0..12),
            cuts in proptest::collection::vec(any::<usize>(), 0..24),
        ) {
            let bytes = wire(&events);
            let (decoded, terminated) = decode_chunked(&bytes, &cuts);
            prop_assert!(terminated);
            prop_assert_eq!(decoded, events);
        }

        #[test]
        fn byte_at_a_time_matches_single_pass(
            events in proptest::collection::vec(arb_event(), 0..6),
        ) {
            let bytes = wire(&events);
            let cuts: Vec<usize> = (0..bytes.len()).collect();
            let (decoded, terminated) = decode_chunked(&bytes, &cuts);
            prop_assert!(terminated);
            prop_assert_eq!(decoded, decode(&bytes).events);
        }
    }
}
