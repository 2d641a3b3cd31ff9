//! Deterministic generator for offline runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use crate::generation::{
    FragmentStream, GenerationError, GenerationPurpose, GenerationRequest, GenerationResult,
    TextGenerator,
};

const DEFAULT_QUESTIONS: &[&str] = &[
    "Walk me through a recent project you are proud of and the part you owned.",
    "What trade-offs did you weigh when you chose that design?",
    "Tell me about a production incident you debugged and what you changed afterwards.",
    "How do you decide when code is ready to ship?",
    "Which part of this role do you expect to be hardest for you, and why?",
];

const DEFAULT_FEEDBACK: &str = r#"{"overall_score": 78, "summary": "Clear answers with concrete examples.", "strengths": ["Structured storytelling"], "weaknesses": ["Limited metrics"], "suggestions": ["Quantify the impact of your work"]}"#;

/// Split text into word fragments, each followed by one space.
pub fn chunk_text(text: &str) -> Vec<String> {
    text.split_whitespace().map(|token| format!("{token} ")).collect()
}

/// Generator that replays canned questions and a canned feedback object.
pub struct ScriptedGenerator {
    questions: Vec<String>,
    feedback: String,
    fail_after: Option<usize>,
    unavailable: bool,
    question_cursor: AtomicUsize,
    call_count: AtomicUsize,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGenerator {
    /// Generator with the built-in questions and feedback.
    pub fn new() -> Self {
        Self {
            questions: DEFAULT_QUESTIONS.iter().map(|q| (*q).to_string()).collect(),
            feedback: DEFAULT_FEEDBACK.to_string(),
            fail_after: None,
            unavailable: false,
            question_cursor: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Replace the questions; they are handed out in order and cycle.
    #[must_use]
    pub fn with_questions<I, S>(mut self, questions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.questions = questions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the feedback text returned for feedback requests.
    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = feedback.into();
        self
    }

    /// Streams yield `n` fragments and then fail.
    #[must_use]
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Every call fails before producing anything.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of `stream` and `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    fn reply_for(&self, request: &GenerationRequest) -> GenerationResult<String> {
        let _ = self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.unavailable {
            return Err(GenerationError::Scripted {
                message: "scripted generator unavailable".into(),
            });
        }
        match request.purpose {
            GenerationPurpose::Feedback => Ok(self.feedback.clone()),
            GenerationPurpose::FirstQuestion | GenerationPurpose::FollowUp => {
                if self.questions.is_empty() {
                    return Err(GenerationError::Empty);
                }
                let idx = self.question_cursor.fetch_add(1, Ordering::Relaxed);
                Ok(self.questions[idx % self.questions.len()].clone())
            }
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &GenerationRequest) -> GenerationResult<FragmentStream> {
        let text = self.reply_for(request)?;
        let fragments = chunk_text(&text);

        match self.fail_after {
            Some(n) => {
                let items: Vec<GenerationResult<String>> = fragments
                    .into_iter()
                    .take(n)
                    .map(Ok)
                    .chain(std::iter::once(Err(GenerationError::Scripted {
                        message: format!("scripted failure after {n} fragments"),
                    })))
                    .collect();
                Ok(Box::pin(stream::iter(items)))
            }
            None => Ok(Box::pin(stream::iter(fragments.into_iter().map(Ok)))),
        }
    }

    async fn complete(&self, request: &GenerationRequest) -> GenerationResult<String> {
        self.reply_for(request)
    }
}
