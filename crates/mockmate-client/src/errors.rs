//! Client error types.

use std::time::Duration;

use mockmate_protocol::FrameError;

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failures of the transport and the byte source.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `detail` of the error body, or the raw body.
        message: String,
    },

    /// No chunk arrived within the idle timeout.
    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),

    /// A partial frame outgrew the parse buffer.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A synchronous response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The byte source failed for another reason.
    #[error("{0}")]
    Source(String),
}

impl ClientError {
    /// Short classification string for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_timeout() => "timeout",
            Self::Http(e) if e.is_connect() => "connect",
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::IdleTimeout(_) => "idle_timeout",
            Self::Frame(_) => "frame",
            Self::Decode(_) => "decode",
            Self::Source(_) => "source",
        }
    }
}

/// Failure of one logical turn after the fallback was attempted.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The stream failed and so did the single synchronous attempt.
    #[error("stream failed ({stream}); fallback failed: {fallback}")]
    FallbackFailed {
        /// Message of the stream failure that triggered the fallback.
        stream: String,
        /// Error of the synchronous attempt.
        #[source]
        fallback: ClientError,
    },

    /// The caller cancelled the turn.
    #[error("turn cancelled")]
    Cancelled,
}

impl TurnError {
    /// Short classification string for logging/metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::FallbackFailed { .. } => "fallback_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message() {
        let err = ClientError::Status {
            status: 404,
            message: "Session not found".into(),
        };
        assert_eq!(err.to_string(), "server returned 404: Session not found");
        assert_eq!(err.category(), "status");
    }

    #[test]
    fn frame_error_is_transparent() {
        let err = ClientError::from(FrameError::FrameTooLarge {
            buffered: 20,
            limit: 10,
        });
        assert_eq!(err.category(), "frame");
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn turn_error_keeps_both_messages() {
        let err = TurnError::FallbackFailed {
            stream: "connection reset".into(),
            fallback: ClientError::IdleTimeout(Duration::from_secs(1)),
        };
        let text = err.to_string();
        assert!(text.contains("connection reset"));
        assert!(text.contains("no data received"));
        assert_eq!(err.category(), "fallback_failed");
        assert_eq!(TurnError::Cancelled.category(), "cancelled");
    }
}
