//! # Generation Collaborator
//!
//! Text generation behind one trait so the channel producer never knows
//! whether fragments come from an upstream model or a script.
//!
//! A [`FragmentStream`] yields `Ok(fragment)` items, ends at end-of-output,
//! and yields `Err` once if generation fails part-way.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

/// Result type alias for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Boxed stream of text fragments returned by [`TextGenerator::stream`].
pub type FragmentStream = Pin<Box<dyn Stream<Item = GenerationResult<String>> + Send>>;

/// Errors that can occur while generating text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or description.
        message: String,
    },

    /// Upstream response could not be interpreted.
    #[error("malformed response: {message}")]
    Malformed {
        /// Error description.
        message: String,
    },

    /// Upstream produced no text.
    #[error("generator returned empty content")]
    Empty,

    /// Failure injected by a scripted generator.
    #[error("{message}")]
    Scripted {
        /// Error description.
        message: String,
    },
}

impl GenerationError {
    /// Error category string for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Api { .. } => "api",
            Self::Malformed { .. } => "parse",
            Self::Empty => "empty",
            Self::Scripted { .. } => "scripted",
        }
    }
}

/// What a generation request is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPurpose {
    /// Opening question of a session.
    FirstQuestion,
    /// Question after at least one answer.
    FollowUp,
    /// Final evaluation as JSON.
    Feedback,
}

/// Chat message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions.
    System,
    /// Content to respond to.
    User,
}

/// One chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

/// One request to a [`TextGenerator`].
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// What the output is used for.
    pub purpose: GenerationPurpose,
    /// System instructions.
    pub system: String,
    /// User content.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl GenerationRequest {
    /// The request as a system + user message pair.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: self.system.clone(),
            },
            ChatMessage {
                role: Role::User,
                content: self.user.clone(),
            },
        ]
    }
}

/// Source of generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generator identifier for logs.
    fn name(&self) -> &str;

    /// Start generating; fragments arrive through the returned stream.
    async fn stream(&self, request: &GenerationRequest) -> GenerationResult<FragmentStream>;

    /// Generate the whole text in one call.
    async fn complete(&self, request: &GenerationRequest) -> GenerationResult<String>;
}
