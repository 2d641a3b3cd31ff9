//! # mockmate-core
//!
//! Shared vocabulary for the MockMate streaming interview system.
//!
//! - **Branded IDs**: [`SessionId`] as a newtype over the opaque wire string
//! - **Logical events**: [`LogicalEvent`], one variant per event kind, each with
//!   its own typed payload
//! - **Interview domain**: prompts, feedback, and the [`TurnOutcome`] carried by
//!   `domain-terminal`
//! - **Requests**: [`TurnRequest`], the single request shape used by both the
//!   streaming and the synchronous endpoints
//! - **Errors**: [`DomainError`] for session-level failures

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod interview;

pub use errors::DomainError;
pub use events::{EventKind, LogicalEvent, TransportErrorKind};
pub use ids::{PromptId, SessionId};
pub use interview::{
    AnswerTurn, InterviewFeedback, InterviewPrompt, Language, PromptKind, StartInterview,
    TurnOutcome, TurnRequest,
};
