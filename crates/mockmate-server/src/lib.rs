//! # mockmate-server
//!
//! Server side of the MockMate interview channel.
//!
//! - Channel producer: drives one turn and emits framed events, always ending
//!   with the terminator frame
//! - Collaborators: [`TextGenerator`] (scripted or OpenAI-compatible) and
//!   [`SessionCollaborator`] (in-memory interview sessions)
//! - Axum HTTP surface with streaming and synchronous endpoints per turn
//! - Prometheus metrics and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod feedback;
pub mod generation;
pub mod health;
pub mod metrics;
pub mod openai;
pub mod producer;
pub mod prompts;
pub mod routes;
pub mod scripted;
pub mod server;
pub mod sessions;
pub mod shutdown;

pub use config::ServerConfig;
pub use generation::{GenerationError, TextGenerator};
pub use openai::{OpenAiCompatConfig, OpenAiCompatGenerator};
pub use producer::ChannelProducer;
pub use scripted::ScriptedGenerator;
pub use server::MockmateServer;
pub use sessions::{InMemorySessions, SessionCollaborator};
pub use shutdown::ShutdownCoordinator;
