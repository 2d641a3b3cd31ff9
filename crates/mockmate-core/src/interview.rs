//! # Interview Domain
//!
//! Requests, prompts, and outcomes exchanged between the interview client and
//! server. [`TurnRequest`] is the one request shape shared by the streaming
//! endpoint and its synchronous fallback, so the two argument lists cannot
//! drift apart.

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::ids::{PromptId, SessionId};

/// Smallest accepted question count.
pub const MIN_QUESTION_COUNT: u32 = 1;
/// Largest accepted question count.
pub const MAX_QUESTION_COUNT: u32 = 15;

/// Streaming endpoint that opens a session and streams the first question.
pub const START_STREAM_PATH: &str = "/api/interview/start";
/// Synchronous twin of [`START_STREAM_PATH`].
pub const START_SYNC_PATH: &str = "/api/interview/start/sync";
/// Streaming endpoint that records an answer and streams the next question.
pub const RESPOND_STREAM_PATH: &str = "/api/interview/respond-stream";
/// Synchronous twin of [`RESPOND_STREAM_PATH`].
pub const RESPOND_SYNC_PATH: &str = "/api/interview/respond";

/// Interview language.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Simplified Chinese.
    Zh,
}

/// Whether a prompt opens a topic or digs into the previous answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Opening question.
    #[default]
    Main,
    /// Follow-up on the previous answer.
    FollowUp,
}

/// One interview question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterviewPrompt {
    /// Prompt identifier.
    pub id: PromptId,
    /// Question text.
    pub text: String,
    /// Topic label.
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Main or follow-up.
    #[serde(rename = "type", default)]
    pub kind: PromptKind,
    /// Interviewer style the question was asked in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl InterviewPrompt {
    /// Build a prompt with a fresh id and the default topic.
    pub fn new(text: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            id: PromptId::new(),
            text: text.into(),
            topic: default_topic(),
            kind,
            style: None,
        }
    }
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_style() -> String {
    "general".to_string()
}

fn default_question_count() -> u32 {
    5
}

/// Final evaluation of a completed interview.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewFeedback {
    /// Score between 0 and 100.
    pub overall_score: f64,
    /// One-paragraph summary.
    pub summary: String,
    /// What went well.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// What did not.
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// How to improve.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Business outcome of one turn: the `domain-terminal` payload and the body
/// of a synchronous response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Session the turn belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Whether the interview is over.
    pub completed: bool,
    /// Next question, when the interview continues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<InterviewPrompt>,
    /// Final evaluation, when the interview is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<InterviewFeedback>,
}

impl TurnOutcome {
    /// The interview continues, optionally with a next question.
    pub fn pending(prompt: Option<InterviewPrompt>) -> Self {
        Self {
            session_id: None,
            completed: false,
            prompt,
            feedback: None,
        }
    }

    /// The interview is over.
    pub fn concluded(feedback: InterviewFeedback) -> Self {
        Self {
            session_id: None,
            completed: true,
            prompt: None,
            feedback: Some(feedback),
        }
    }

    /// Attach the session id.
    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Text of the next question, if any.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_ref().map(|p| p.text.as_str())
    }
}

/// Open a new interview session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StartInterview {
    /// Owner of the session.
    pub user_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Extracted resume summary.
    pub resume_summary: String,
    /// Target job description.
    pub job_description: String,
    /// Interviewer persona.
    #[serde(default = "default_style")]
    pub interviewer_style: String,
    /// Number of answered questions after which the interview concludes.
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    /// Interview language.
    #[serde(default)]
    pub language: Language,
}

impl StartInterview {
    /// A request with default style, count, and language.
    pub fn new(
        user_id: impl Into<String>,
        resume_summary: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: None,
            resume_summary: resume_summary.into(),
            job_description: job_description.into(),
            interviewer_style: default_style(),
            question_count: default_question_count(),
            language: Language::default(),
        }
    }
}

/// Answer the current question of an open session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerTurn {
    /// Session being answered.
    pub session_id: SessionId,
    /// Candidate answer.
    pub answer: String,
    /// Time the candidate took, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    /// Prompt being answered. A replayed answer to an earlier prompt returns
    /// the stored result instead of being recorded again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_id: Option<PromptId>,
}

impl AnswerTurn {
    /// Answer without timing or prompt reference.
    pub fn new(session_id: SessionId, answer: impl Into<String>) -> Self {
        Self {
            session_id,
            answer: answer.into(),
            elapsed_seconds: None,
            prompt_id: None,
        }
    }

    /// Tie the answer to the prompt it answers.
    #[must_use]
    pub fn for_prompt(mut self, prompt_id: PromptId) -> Self {
        self.prompt_id = Some(prompt_id);
        self
    }
}

/// One logical turn request, valid for both the streaming and the synchronous
/// endpoint.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnRequest {
    /// Start a session and ask the first question.
    Start(StartInterview),
    /// Answer and receive the next question or the final feedback.
    Answer(AnswerTurn),
}

impl TurnRequest {
    /// Path of the streaming endpoint.
    pub fn stream_path(&self) -> &'static str {
        match self {
            Self::Start(_) => START_STREAM_PATH,
            Self::Answer(_) => RESPOND_STREAM_PATH,
        }
    }

    /// Path of the synchronous fallback endpoint.
    pub fn sync_path(&self) -> &'static str {
        match self {
            Self::Start(_) => START_SYNC_PATH,
            Self::Answer(_) => RESPOND_SYNC_PATH,
        }
    }

    /// JSON body shared by both endpoints.
    pub fn body(&self) -> serde_json::Value {
        let body = match self {
            Self::Start(start) => serde_json::to_value(start),
            Self::Answer(answer) => serde_json::to_value(answer),
        };
        // Plain data structs with string keys always serialize.
        body.unwrap_or_default()
    }

    /// Reject requests that cannot succeed on any path.
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Start(start) => {
                if start.user_id.trim().is_empty() {
                    return Err(DomainError::InvalidRequest("user_id must not be empty".into()));
                }
                if !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&start.question_count) {
                    return Err(DomainError::InvalidRequest(format!(
                        "question_count must be between {MIN_QUESTION_COUNT} and {MAX_QUESTION_COUNT}, got {}",
                        start.question_count
                    )));
                }
                Ok(())
            }
            Self::Answer(answer) => {
                if answer.session_id.as_str().is_empty() {
                    return Err(DomainError::InvalidRequest("session_id must not be empty".into()));
                }
                Ok(())
            }
        }
    }
}

impl From<StartInterview> for TurnRequest {
    fn from(value: StartInterview) -> Self {
        Self::Start(value)
    }
}

impl From<AnswerTurn> for TurnRequest {
    fn from(value: AnswerTurn) -> Self {
        Self::Answer(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
