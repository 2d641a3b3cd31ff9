//! # Frames
//!
//! A frame is the text between two blank-line delimiters. Inside a frame only
//! `data:` lines matter; comments (`:`) and other SSE fields are ignored, and
//! several `data:` lines are joined with `\n`.
//!
//! Input is expected to be normalized (no `\r`); [`FrameBuffer`] takes care of
//! that on ingestion.
//!
//! [`FrameBuffer`]: crate::FrameBuffer

/// Blank line separating two frames.
pub const DELIMITER: &[u8] = b"\n\n";

/// Data payload of the sentinel frame that closes a channel.
pub const TERMINATOR_LITERAL: &str = "[DONE]";

/// One complete frame, classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawFrame {
    /// Joined `data:` payload.
    Data(String),
    /// The sentinel frame.
    Terminator,
    /// Comment-only or field-only frame with no data; keep-alives look like this.
    Empty,
    /// Frame bytes were not valid UTF-8.
    Invalid(String),
}

/// Offset of the first delimiter at or after `from`.
pub fn find_delimiter(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(DELIMITER.len())
        .position(|w| w == DELIMITER)
        .map(|p| p + from)
}

/// Classify the bytes of one frame (delimiter excluded).
pub fn parse_frame(body: &[u8]) -> RawFrame {
    let text = match std::str::from_utf8(body) {
        Ok(t) => t,
        Err(e) => return RawFrame::Invalid(format!("frame is not valid UTF-8: {e}")),
    };

    let mut data: Option<String> = None;
    for line in text.split('\n') {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(acc) => {
                acc.push('\n');
                acc.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }

    match data {
        Some(d) if d.trim() == TERMINATOR_LITERAL => RawFrame::Terminator,
        Some(d) if d.trim().is_empty() => RawFrame::Empty,
        Some(d) => RawFrame::Data(d),
        None => RawFrame::Empty,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
