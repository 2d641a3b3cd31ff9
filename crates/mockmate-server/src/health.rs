//! `/api/health` endpoint body.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Sessions not yet completed.
    pub active_sessions: usize,
    /// Name of the text generator in use.
    pub generator: String,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, active_sessions: usize, generator: &str) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        active_sessions,
        generator: generator.to_string(),
    }
}
