//! Server configuration.

use std::time::Duration;

use mockmate_settings::MockmateSettings;

use crate::prompts::Temperatures;

/// Configuration for the MockMate server.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Delay between two `content-delta` events.
    pub pacing: Duration,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    /// Sampling temperatures.
    pub temperatures: Temperatures,
    /// Time open channels get after shutdown before they are aborted.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Derive the server configuration from loaded settings.
    pub fn from_settings(settings: &MockmateSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            pacing: Duration::from_millis(settings.server.pacing_delay_ms),
            cors_origins: settings.server.cors_origins.clone(),
            temperatures: Temperatures {
                question: settings.llm.question_temperature,
                feedback: settings.llm.feedback_temperature,
            },
            drain_timeout: Duration::from_millis(settings.server.shutdown_drain_ms),
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&MockmateSettings::default())
    }
}
