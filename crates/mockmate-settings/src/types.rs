//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file and
//! `#[serde(default)]` so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MockmateSettings {
    /// HTTP server and channel producer.
    pub server: ServerSettings,
    /// Streaming client, playback, and fallback.
    pub client: ClientSettings,
    /// Upstream text generation.
    pub llm: LlmSettings,
    /// Interview defaults.
    pub interview: InterviewSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Server network and pacing settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Delay between two `content-delta` events, in milliseconds.
    pub pacing_delay_ms: u64,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
    /// How long open channels may run after shutdown before they are aborted,
    /// in milliseconds.
    pub shutdown_drain_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            pacing_delay_ms: 50,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            shutdown_drain_ms: 10_000,
        }
    }
}

/// Client transport and playback settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Server base URL.
    pub base_url: String,
    /// Playback tick interval, in milliseconds.
    pub tick_interval_ms: u64,
    /// Connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest gap between two chunks before the channel is abandoned.
    pub idle_timeout_ms: u64,
    /// Upper bound for one partial frame.
    pub max_frame_bytes: usize,
    /// Malformed frames in a row before the channel is abandoned.
    pub max_consecutive_parse_errors: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            tick_interval_ms: 30,
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 90_000,
            max_frame_bytes: 1024 * 1024,
            max_consecutive_parse_errors: 8,
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// API key; scripted generation is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature for questions.
    pub question_temperature: f32,
    /// Sampling temperature for the final feedback.
    pub feedback_temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            question_temperature: 0.4,
            feedback_temperature: 0.5,
        }
    }
}

/// Interview defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewSettings {
    /// Question count offered when the user does not choose one.
    pub default_question_count: u32,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            default_question_count: 6,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level directive.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
