//! Metric names recorded by the client.

/// Frames that failed to parse (counter).
pub const FRAMES_MALFORMED_TOTAL: &str = "frames_malformed_total";
/// Synchronous fallbacks attempted (counter, labels: outcome).
pub const FALLBACKS_TOTAL: &str = "fallbacks_total";
