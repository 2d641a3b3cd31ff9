//! # Playback Scheduler
//!
//! Reveals the text of one turn at a fixed cadence, one `char` per tick,
//! however bursty the `content-delta` arrivals are.
//!
//! - `content-delta` appends to the source text and never moves the cursor.
//! - `content-complete` replaces the source text with the authoritative total.
//!   A shorter total clamps the cursor down and stops ticking.
//! - `domain-terminal` only marks the turn as ended; the turn is finished once
//!   the cursor has caught up as well.
//! - `cancel` stops ticking for good and is idempotent.
//!
//! The scheduler owns no timer. The caller awaits a
//! [`TickSource`](crate::ticks::TickSource) and calls [`PlaybackScheduler::tick`]
//! while [`PlaybackScheduler::is_ticking`] holds.

use tracing::{debug, warn};

/// Text known so far and how much of it is shown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackState {
    source_text: String,
    source_len: usize,
    revealed_len: usize,
    // Byte offset of the cursor in `source_text`.
    revealed_bytes: usize,
}

impl PlaybackState {
    /// All text known so far.
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Length of the source text, in chars.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Chars revealed so far.
    pub fn revealed_len(&self) -> usize {
        self.revealed_len
    }

    /// Whether the cursor has reached the end of the known text.
    pub fn target_reached(&self) -> bool {
        self.revealed_len == self.source_len
    }

    /// The revealed prefix.
    pub fn revealed_text(&self) -> &str {
        &self.source_text[..self.revealed_bytes]
    }

    fn advance(&mut self) -> Option<char> {
        let next = self.source_text[self.revealed_bytes..].chars().next()?;
        self.revealed_len += 1;
        self.revealed_bytes += next.len_utf8();
        Some(next)
    }

    fn replace(&mut self, text: &str) {
        self.source_text.clear();
        self.source_text.push_str(text);
        self.source_len = text.chars().count();
        self.revealed_len = self.revealed_len.min(self.source_len);
        self.revealed_bytes = text
            .char_indices()
            .nth(self.revealed_len)
            .map_or(text.len(), |(idx, _)| idx);
    }
}

/// Fixed-cadence reveal of one turn's text.
#[derive(Debug, Default)]
pub struct PlaybackScheduler {
    state: PlaybackState,
    ticking: bool,
    terminal_seen: bool,
    cancelled: bool,
}

impl PlaybackScheduler {
    /// Scheduler with no text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn, discarding the previous one.
    pub fn begin_turn(&mut self) {
        *self = Self::default();
    }

    /// Current state.
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// The revealed prefix.
    pub fn revealed_text(&self) -> &str {
        self.state.revealed_text()
    }

    /// Append one fragment.
    pub fn on_delta(&mut self, fragment: &str) {
        if self.cancelled {
            return;
        }
        self.state.source_text.push_str(fragment);
        self.state.source_len += fragment.chars().count();
        self.update_ticking();
    }

    /// Replace the text with the authoritative total.
    pub fn on_complete(&mut self, total: &str) {
        if self.cancelled {
            return;
        }
        if self.state.source_text != total && !self.state.source_text.is_empty() {
            warn!(
                streamed = self.state.source_len,
                total = total.chars().count(),
                "content-complete differs from accumulated deltas"
            );
        }
        let before = self.state.revealed_len;
        self.state.replace(total);
        if self.state.revealed_len < before {
            debug!(from = before, to = self.state.revealed_len, "reveal cursor clamped");
            self.ticking = false;
            return;
        }
        self.update_ticking();
    }

    /// The turn's outcome arrived; no more content follows.
    pub fn on_domain_terminal(&mut self) {
        self.terminal_seen = true;
    }

    /// Advance the cursor by one char. Returns the revealed char, or `None`
    /// when not ticking.
    pub fn tick(&mut self) -> Option<char> {
        if !self.ticking {
            return None;
        }
        let next = self.state.advance()?;
        self.update_ticking();
        Some(next)
    }

    /// Whether the cursor still has text to reveal.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// The outcome arrived and everything known is revealed.
    pub fn is_finished(&self) -> bool {
        self.terminal_seen && self.state.target_reached() && !self.cancelled
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Stop ticking. Idempotent.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            debug!(revealed = self.state.revealed_len, "playback cancelled");
        }
        self.cancelled = true;
        self.ticking = false;
    }

    fn update_ticking(&mut self) {
        self.ticking = !self.cancelled && self.state.revealed_len < self.state.source_len;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut PlaybackScheduler) -> usize {
        let mut ticks = 0;
        while s.tick().is_some() {
            ticks += 1;
            assert!(s.state().revealed_len() <= s.state().source_len());
        }
        ticks
    }

    #[test]
    fn delta_does_not_move_cursor() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hel");
        assert_eq!(s.state().revealed_len(), 0);
        assert!(s.is_ticking());
    }

    #[test]
    fn reveals_one_char_per_tick() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hel");
        assert_eq!(s.tick(), Some('H'));
        assert_eq!(s.revealed_text(), "H");
        s.on_delta("lo");
        assert_eq!(drain(&mut s), 4);
        assert_eq!(s.revealed_text(), "Hello");
        assert!(!s.is_ticking());
        assert_eq!(s.tick(), None);
    }

    #[test]
    fn hello_scenario_finishes_after_catching_up() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hel");
        s.on_delta("lo");
        s.on_complete("Hello");
        s.on_domain_terminal();
        assert!(!s.is_finished());
        assert_eq!(drain(&mut s), 5);
        assert!(s.is_finished());
        assert_eq!(s.state().source_text(), "Hello");
        assert_eq!(s.state().revealed_len(), 5);
    }

    #[test]
    fn complete_resumes_ticking_after_catch_up() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hi");
        let _ = drain(&mut s);
        assert!(!s.is_ticking());
        s.on_complete("Hi there");
        assert!(s.is_ticking());
        assert_eq!(drain(&mut s), 6);
        assert_eq!(s.revealed_text(), "Hi there");
    }

    #[test]
    fn truncating_correction_clamps_and_stops() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hello world");
        for _ in 0..8 {
            let _ = s.tick();
        }
        s.on_complete("Hello");
        assert_eq!(s.state().revealed_len(), 5);
        assert_eq!(s.state().source_text(), "Hello");
        assert!(!s.is_ticking());
        assert!(s.state().target_reached());
    }

    #[test]
    fn correction_replaces_drifted_text() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Helo");
        s.on_complete("Hello");
        let _ = drain(&mut s);
        assert_eq!(s.revealed_text(), "Hello");
    }

    #[test]
    fn mismatch_is_logged() {
        let (logs, _guard) = mockmate_logging::capture_logs();
        let mut s = PlaybackScheduler::new();
        s.on_delta("abc");
        s.on_complete("abd");
        assert!(logs.has_event(tracing::Level::WARN, "differs from accumulated deltas"));
    }

    #[test]
    fn multibyte_text_reveals_by_char() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("你好");
        assert_eq!(s.tick(), Some('你'));
        assert_eq!(s.revealed_text(), "你");
        assert_eq!(s.tick(), Some('好'));
        assert_eq!(s.tick(), None);
    }

    #[test]
    fn correction_keeps_cursor_on_char_boundary() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("héllo wörld");
        for _ in 0..3 {
            let _ = s.tick();
        }
        s.on_complete("héllo, wörld");
        assert_eq!(s.revealed_text(), "hél");
        let _ = drain(&mut s);
        assert_eq!(s.revealed_text(), "héllo, wörld");

        s.on_complete("hé");
        assert_eq!(s.revealed_text(), "hé");
        assert_eq!(s.state().revealed_len(), 2);
    }

    #[test]
    fn long_text_reveals_completely() {
        let text = "ab汉".repeat(20_000);
        let mut s = PlaybackScheduler::new();
        s.on_delta(&text);
        assert_eq!(drain(&mut s), 60_000);
        assert_eq!(s.revealed_text(), text);
        assert!(s.state().target_reached());
    }

    #[test]
    fn terminal_without_content_is_finished() {
        let mut s = PlaybackScheduler::new();
        s.on_domain_terminal();
        assert!(s.is_finished());
    }

    #[test]
    fn cancel_halts_and_is_idempotent() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("Hello");
        let _ = s.tick();
        s.cancel();
        s.cancel();
        assert!(s.is_cancelled());
        assert!(!s.is_ticking());
        assert_eq!(s.tick(), None);
        s.on_delta(" more");
        assert_eq!(s.state().source_text(), "Hello");
        assert_eq!(s.revealed_text(), "H");
    }

    #[test]
    fn begin_turn_resets() {
        let mut s = PlaybackScheduler::new();
        s.on_delta("old");
        s.cancel();
        s.begin_turn();
        assert!(!s.is_cancelled());
        assert_eq!(s.state(), &PlaybackState::default());
    }
}
