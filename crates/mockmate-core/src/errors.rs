//! Domain error types.

use thiserror::Error;

/// Failures raised by the interview session layer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// No session with this id exists.
    #[error("Session not found")]
    SessionNotFound,
    /// The session already produced its final feedback.
    #[error("Interview already completed")]
    AlreadyCompleted,
    /// The session has no question waiting for an answer.
    #[error("No active interview question")]
    NoActivePrompt,
    /// The answer refers to a prompt this session never asked.
    #[error("Answer does not match an asked question")]
    StalePrompt,
    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The text generator failed.
    #[error("generation failed: {0}")]
    Generation(String),
}

impl DomainError {
    /// HTTP status used by the synchronous endpoints.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SessionNotFound => 404,
            Self::AlreadyCompleted | Self::StalePrompt => 409,
            Self::NoActivePrompt | Self::InvalidRequest(_) => 400,
            Self::Generation(_) => 502,
        }
    }

    /// Short classification string for logging/metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "session_not_found",
            Self::AlreadyCompleted => "already_completed",
            Self::NoActivePrompt => "no_active_prompt",
            Self::StalePrompt => "stale_prompt",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Generation(_) => "generation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_wire_text() {
        assert_eq!(DomainError::SessionNotFound.to_string(), "Session not found");
        assert_eq!(
            DomainError::AlreadyCompleted.to_string(),
            "Interview already completed"
        );
        assert_eq!(
            DomainError::NoActivePrompt.to_string(),
            "No active interview question"
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(DomainError::SessionNotFound.status_code(), 404);
        assert_eq!(DomainError::AlreadyCompleted.status_code(), 409);
        assert_eq!(DomainError::StalePrompt.status_code(), 409);
        assert_eq!(DomainError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(DomainError::Generation("x".into()).status_code(), 502);
    }
}
