//! # Interview Sessions
//!
//! The domain-session collaborator of the channel producer. A turn is split
//! in two so text generation can happen in between:
//!
//! 1. [`SessionCollaborator::begin_turn`] validates the request, records the
//!    answer (if any) and returns a [`TurnPlan`]: either the generation request
//!    for the next question, or `Conclude`.
//! 2. [`SessionCollaborator::continue_turn`] stores the generated question, or
//!    [`SessionCollaborator::conclude_turn`] produces the final feedback.
//!
//! Answering the same prompt twice (a retried turn) replaces the recorded
//! answer instead of adding a turn. An answer that names an earlier prompt
//! the session already moved past is a replay: it returns the stored result
//! ([`NextStep::Replay`]) and records nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockmate_core::{
    DomainError, InterviewFeedback, InterviewPrompt, Language, PromptId, PromptKind, SessionId,
    TurnOutcome, TurnRequest,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::feedback::parse_feedback;
use crate::generation::{GenerationRequest, TextGenerator};
use crate::prompts::{self, Temperatures, TranscriptEntry};

/// What the producer does next for a turn.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnPlan {
    /// Session the turn belongs to.
    pub session_id: SessionId,
    /// Next step.
    pub next: NextStep,
}

/// Next step of a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum NextStep {
    /// Generate the next question with this request.
    Ask(GenerationRequest),
    /// Enough questions were answered; produce the final feedback.
    Conclude,
    /// The answer was already recorded; return this stored outcome.
    Replay(TurnOutcome),
}

/// One recorded question/answer pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnRecord {
    /// 1-based position in the session.
    pub sequence: u32,
    /// Question text.
    pub question: String,
    /// Main or follow-up.
    pub question_type: PromptKind,
    /// Topic label.
    pub topic: String,
    /// Candidate answer.
    pub answer: String,
    /// When the answer was recorded.
    pub asked_at: DateTime<Utc>,
    /// Time the candidate took, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    #[serde(skip)]
    prompt_id: PromptId,
}

/// Summary row for the history listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryItem {
    /// Session identifier.
    pub session_id: SessionId,
    /// Interviewer persona.
    pub interviewer_style: String,
    /// Interview language.
    pub language: Language,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Answered questions.
    pub question_count: u32,
    /// Final score, once completed.
    pub overall_score: Option<f64>,
    /// Final summary, once completed.
    pub summary: Option<String>,
}

/// Full view of one session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionDetail {
    /// Session identifier.
    pub session_id: SessionId,
    /// Owner.
    pub user_id: String,
    /// Display name.
    pub user_name: Option<String>,
    /// Interviewer persona.
    pub interviewer_style: String,
    /// Interview language.
    pub language: Language,
    /// Resume summary the session was started with.
    pub resume_summary: String,
    /// Job description the session was started with.
    pub job_description: String,
    /// Answered turns in order.
    pub turns: Vec<TurnRecord>,
    /// Final feedback, once completed.
    pub feedback: Option<InterviewFeedback>,
    /// Creation time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Domain-session operations used by the channel producer and the routes.
#[async_trait]
pub trait SessionCollaborator: Send + Sync {
    /// Validate the request, record any answer, and decide the next step.
    async fn begin_turn(&self, request: &TurnRequest) -> Result<TurnPlan, DomainError>;

    /// Store generated question text as the session's current prompt.
    async fn continue_turn(
        &self,
        session_id: &SessionId,
        question: &str,
    ) -> Result<TurnOutcome, DomainError>;

    /// Generate the final feedback and complete the session.
    async fn conclude_turn(&self, session_id: &SessionId) -> Result<TurnOutcome, DomainError>;

    /// End a session early. Returns the stored feedback if already completed.
    async fn end(&self, session_id: &SessionId) -> Result<InterviewFeedback, DomainError>;

    /// Sessions of a user, newest first.
    async fn history(&self, user_id: &str) -> Vec<HistoryItem>;

    /// Full view of one session.
    async fn detail(&self, session_id: &SessionId) -> Result<SessionDetail, DomainError>;

    /// Drop a freshly started session whose first turn failed. Sessions
    /// with answers or feedback are kept.
    async fn abandon(&self, session_id: &SessionId);

    /// Sessions not yet completed.
    fn active_count(&self) -> usize;
}

#[derive(Clone, Debug)]
struct SessionRecord {
    session_id: SessionId,
    user_id: String,
    user_name: Option<String>,
    interviewer_style: String,
    language: Language,
    resume_summary: String,
    job_description: String,
    question_count: u32,
    turns: Vec<TurnRecord>,
    current_prompt: Option<InterviewPrompt>,
    feedback: Option<InterviewFeedback>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    fn completed(&self) -> bool {
        self.completed_at.is_some()
    }

    fn transcript(&self) -> Vec<TranscriptEntry<'_>> {
        self.turns
            .iter()
            .map(|t| TranscriptEntry {
                question: &t.question,
                answer: &t.answer,
            })
            .collect()
    }

    fn answered(&self) -> u32 {
        u32::try_from(self.turns.len()).unwrap_or(u32::MAX)
    }
}

/// In-memory session store. Sessions do not survive a restart.
pub struct InMemorySessions {
    sessions: Mutex<HashMap<SessionId, SessionRecord>>,
    generator: Arc<dyn TextGenerator>,
    temperatures: Temperatures,
}

impl InMemorySessions {
    /// Store that generates feedback with `generator`.
    pub fn new(generator: Arc<dyn TextGenerator>, temperatures: Temperatures) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            generator,
            temperatures,
        }
    }

    fn start(&self, request: &mockmate_core::StartInterview) -> TurnPlan {
        let session_id = SessionId::new();
        let ask = prompts::first_question(
            &request.resume_summary,
            &request.job_description,
            &request.interviewer_style,
            request.language,
            self.temperatures,
        );
        let record = SessionRecord {
            session_id: session_id.clone(),
            user_id: request.user_id.clone(),
            user_name: request.user_name.clone(),
            interviewer_style: request.interviewer_style.clone(),
            language: request.language,
            resume_summary: request.resume_summary.clone(),
            job_description: request.job_description.clone(),
            question_count: request.question_count,
            turns: Vec::new(),
            current_prompt: None,
            feedback: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        let _ = self.sessions.lock().insert(session_id.clone(), record);
        info!(session_id = %session_id, question_count = request.question_count, "session started");
        TurnPlan {
            session_id,
            next: NextStep::Ask(ask),
        }
    }

    fn record_answer(&self, answer: &mockmate_core::AnswerTurn) -> Result<TurnPlan, DomainError> {
        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(&answer.session_id)
            .ok_or(DomainError::SessionNotFound)?;
        if let Some(answered) = &answer.prompt_id {
            let current = record.current_prompt.as_ref().is_some_and(|p| &p.id == answered);
            if !current {
                return replay(record, answered);
            }
        }
        if record.completed() {
            return Err(DomainError::AlreadyCompleted);
        }
        let prompt = record
            .current_prompt
            .clone()
            .ok_or(DomainError::NoActivePrompt)?;

        let retried = record.turns.last().is_some_and(|t| t.prompt_id == prompt.id);
        if retried {
            debug!(session_id = %record.session_id, "replacing answer of retried turn");
            if let Some(last) = record.turns.last_mut() {
                last.answer.clone_from(&answer.answer);
                last.elapsed_seconds = answer.elapsed_seconds;
                last.asked_at = Utc::now();
            }
        } else {
            let sequence = record.answered() + 1;
            record.turns.push(TurnRecord {
                sequence,
                question: prompt.text.clone(),
                question_type: prompt.kind,
                topic: prompt.topic.clone(),
                answer: answer.answer.clone(),
                asked_at: Utc::now(),
                elapsed_seconds: answer.elapsed_seconds,
                prompt_id: prompt.id.clone(),
            });
        }

        let next = if record.answered() >= record.question_count {
            NextStep::Conclude
        } else {
            NextStep::Ask(prompts::follow_up_question(
                &record.transcript(),
                &record.resume_summary,
                &record.job_description,
                &record.interviewer_style,
                record.language,
                self.temperatures,
            ))
        };
        Ok(TurnPlan {
            session_id: record.session_id.clone(),
            next,
        })
    }

    fn abandon_fresh(&self, session_id: &SessionId) -> bool {
        let mut sessions = self.sessions.lock();
        let fresh = sessions
            .get(session_id)
            .is_some_and(|r| r.turns.is_empty() && !r.completed());
        if fresh {
            let _ = sessions.remove(session_id);
        }
        fresh
    }

    fn feedback_request(&self, session_id: &SessionId) -> Result<GenerationRequest, DomainError> {
        let sessions = self.sessions.lock();
        let record = sessions.get(session_id).ok_or(DomainError::SessionNotFound)?;
        Ok(prompts::final_feedback(
            &record.transcript(),
            &record.interviewer_style,
            record.language,
            self.temperatures,
        ))
    }

    async fn generate_feedback(&self, session_id: &SessionId) -> Result<InterviewFeedback, DomainError> {
        let request = self.feedback_request(session_id)?;
        let raw = self
            .generator
            .complete(&request)
            .await
            .map_err(|e| DomainError::Generation(e.to_string()))?;
        parse_feedback(&raw).map_err(|e| {
            warn!(session_id = %session_id, error = %e, "feedback could not be parsed");
            DomainError::Generation(e.to_string())
        })
    }

    fn complete_with(
        &self,
        session_id: &SessionId,
        feedback: InterviewFeedback,
    ) -> Result<InterviewFeedback, DomainError> {
        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(session_id)
            .ok_or(DomainError::SessionNotFound)?;
        if let (true, Some(stored)) = (record.completed(), record.feedback.as_ref()) {
            return Ok(stored.clone());
        }
        record.feedback = Some(feedback.clone());
        record.current_prompt = None;
        record.completed_at = Some(Utc::now());
        info!(session_id = %session_id, score = feedback.overall_score, "session completed");
        Ok(feedback)
    }
}

fn replay(record: &SessionRecord, answered: &PromptId) -> Result<TurnPlan, DomainError> {
    if !record.turns.iter().any(|t| &t.prompt_id == answered) {
        return Err(DomainError::StalePrompt);
    }
    let outcome = match (&record.feedback, &record.current_prompt) {
        (Some(feedback), _) if record.completed() => TurnOutcome::concluded(feedback.clone()),
        (_, Some(prompt)) => TurnOutcome::pending(Some(prompt.clone())),
        _ => return Err(DomainError::NoActivePrompt),
    };
    debug!(session_id = %record.session_id, prompt_id = %answered, "answer already recorded, replaying outcome");
    Ok(TurnPlan {
        session_id: record.session_id.clone(),
        next: NextStep::Replay(outcome.with_session(record.session_id.clone())),
    })
}

#[async_trait]
impl SessionCollaborator for InMemorySessions {
    async fn begin_turn(&self, request: &TurnRequest) -> Result<TurnPlan, DomainError> {
        request.validate()?;
        match request {
            TurnRequest::Start(start) => Ok(self.start(start)),
            TurnRequest::Answer(answer) => self.record_answer(answer),
        }
    }

    async fn continue_turn(
        &self,
        session_id: &SessionId,
        question: &str,
    ) -> Result<TurnOutcome, DomainError> {
        let text = question.trim();
        if text.is_empty() {
            return Err(DomainError::Generation("generated question is empty".into()));
        }

        let mut sessions = self.sessions.lock();
        let record = sessions
            .get_mut(session_id)
            .ok_or(DomainError::SessionNotFound)?;
        if record.completed() {
            return Err(DomainError::AlreadyCompleted);
        }
        let kind = if record.turns.is_empty() {
            PromptKind::Main
        } else {
            PromptKind::FollowUp
        };
        let mut prompt = InterviewPrompt::new(text, kind);
        prompt.style = Some(record.interviewer_style.clone());
        record.current_prompt = Some(prompt.clone());

        Ok(TurnOutcome::pending(Some(prompt)).with_session(session_id.clone()))
    }

    async fn conclude_turn(&self, session_id: &SessionId) -> Result<TurnOutcome, DomainError> {
        let feedback = self.generate_feedback(session_id).await?;
        let feedback = self.complete_with(session_id, feedback)?;
        Ok(TurnOutcome::concluded(feedback).with_session(session_id.clone()))
    }

    async fn end(&self, session_id: &SessionId) -> Result<InterviewFeedback, DomainError> {
        {
            let sessions = self.sessions.lock();
            let record = sessions.get(session_id).ok_or(DomainError::SessionNotFound)?;
            if let Some(feedback) = record.feedback.as_ref().filter(|_| record.completed()) {
                return Ok(feedback.clone());
            }
        }
        let feedback = self.generate_feedback(session_id).await?;
        self.complete_with(session_id, feedback)
    }

    async fn history(&self, user_id: &str) -> Vec<HistoryItem> {
        let sessions = self.sessions.lock();
        let mut items: Vec<HistoryItem> = sessions
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| HistoryItem {
                session_id: r.session_id.clone(),
                interviewer_style: r.interviewer_style.clone(),
                language: r.language,
                started_at: r.started_at,
                completed_at: r.completed_at,
                question_count: r.answered(),
                overall_score: r.feedback.as_ref().map(|f| f.overall_score),
                summary: r.feedback.as_ref().map(|f| f.summary.clone()),
            })
            .collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        items
    }

    async fn detail(&self, session_id: &SessionId) -> Result<SessionDetail, DomainError> {
        let sessions = self.sessions.lock();
        let r = sessions.get(session_id).ok_or(DomainError::SessionNotFound)?;
        Ok(SessionDetail {
            session_id: r.session_id.clone(),
            user_id: r.user_id.clone(),
            user_name: r.user_name.clone(),
            interviewer_style: r.interviewer_style.clone(),
            language: r.language,
            resume_summary: r.resume_summary.clone(),
            job_description: r.job_description.clone(),
            turns: r.turns.clone(),
            feedback: r.feedback.clone(),
            started_at: r.started_at,
            completed_at: r.completed_at,
        })
    }

    async fn abandon(&self, session_id: &SessionId) {
        if self.abandon_fresh(session_id) {
            info!(session_id = %session_id, "session abandoned after failed first turn");
        }
    }

    fn active_count(&self) -> usize {
        self.sessions.lock().values().filter(|r| !r.completed()).count()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedGenerator;
    use mockmate_core::{AnswerTurn, StartInterview};

    fn store() -> InMemorySessions {
        InMemorySessions::new(Arc::new(ScriptedGenerator::new()), Temperatures::default())
    }

    fn start(count: u32) -> TurnRequest {
        let mut start = StartInterview::new("u1", "Rust engineer", "Backend role");
        start.question_count = count;
        TurnRequest::Start(start)
    }

    fn answer(session_id: &SessionId, text: &str) -> TurnRequest {
        let mut answer = AnswerTurn::new(session_id.clone(), text);
        answer.elapsed_seconds = Some(3.0);
        TurnRequest::Answer(answer)
    }

    fn answer_to(session_id: &SessionId, prompt_id: &PromptId, text: &str) -> TurnRequest {
        TurnRequest::Answer(AnswerTurn::new(session_id.clone(), text).for_prompt(prompt_id.clone()))
    }

    fn current_prompt_id(outcome: &TurnOutcome) -> PromptId {
        outcome.prompt.as_ref().unwrap().id.clone()
    }

    async fn started(store: &InMemorySessions, count: u32) -> SessionId {
        let plan = store.begin_turn(&start(count)).await.unwrap();
        assert!(matches!(plan.next, NextStep::Ask(_)));
        let outcome = store.continue_turn(&plan.session_id, "First?").await.unwrap();
        assert_eq!(outcome.prompt.as_ref().unwrap().kind, PromptKind::Main);
        plan.session_id
    }

    #[tokio::test]
    async fn start_asks_first_question() {
        let store = store();
        let plan = store.begin_turn(&start(2)).await.unwrap();
        match plan.next {
            NextStep::Ask(req) => {
                assert_eq!(req.purpose, crate::generation::GenerationPurpose::FirstQuestion);
            }
            NextStep::Conclude | NextStep::Replay(_) => panic!("expected ask"),
        }
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn answer_before_question_is_rejected() {
        let store = store();
        let plan = store.begin_turn(&start(2)).await.unwrap();
        let err = store.begin_turn(&answer(&plan.session_id, "hi")).await.unwrap_err();
        assert_eq!(err, DomainError::NoActivePrompt);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = store();
        let err = store
            .begin_turn(&answer(&SessionId::from_raw("nope"), "hi"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::SessionNotFound);
    }

    #[tokio::test]
    async fn follow_up_then_conclude() {
        let store = store();
        let id = started(&store, 2).await;

        let plan = store.begin_turn(&answer(&id, "answer one")).await.unwrap();
        assert!(matches!(plan.next, NextStep::Ask(_)));
        let outcome = store.continue_turn(&id, " Second? ").await.unwrap();
        let prompt = outcome.prompt.unwrap();
        assert_eq!(prompt.kind, PromptKind::FollowUp);
        assert_eq!(prompt.text, "Second?");
        assert_eq!(prompt.style.as_deref(), Some("general"));

        let plan = store.begin_turn(&answer(&id, "answer two")).await.unwrap();
        assert_eq!(plan.next, NextStep::Conclude);
        let outcome = store.conclude_turn(&id).await.unwrap();
        assert!(outcome.completed);
        assert!(outcome.feedback.is_some());
        assert_eq!(outcome.session_id.as_ref(), Some(&id));

        let err = store.begin_turn(&answer(&id, "late")).await.unwrap_err();
        assert_eq!(err, DomainError::AlreadyCompleted);
        assert_eq!(store.active_count(), 0);
    }

    #[tokio::test]
    async fn retried_answer_replaces_instead_of_appending() {
        let store = store();
        let id = started(&store, 3).await;
        let _ = store.begin_turn(&answer(&id, "first try")).await.unwrap();
        let _ = store.begin_turn(&answer(&id, "second try")).await.unwrap();

        let detail = store.detail(&id).await.unwrap();
        assert_eq!(detail.turns.len(), 1);
        assert_eq!(detail.turns[0].answer, "second try");
        assert_eq!(detail.turns[0].sequence, 1);
    }

    #[tokio::test]
    async fn replayed_answer_after_next_question_is_not_recorded_again() {
        let store = store();
        let plan = store.begin_turn(&start(3)).await.unwrap();
        let id = plan.session_id;
        let q1 = store.continue_turn(&id, "Q1").await.unwrap();
        let q1_id = current_prompt_id(&q1);

        let _ = store.begin_turn(&answer_to(&id, &q1_id, "A1")).await.unwrap();
        let q2 = store.continue_turn(&id, "Q2").await.unwrap();

        let plan = store.begin_turn(&answer_to(&id, &q1_id, "A1")).await.unwrap();
        match plan.next {
            NextStep::Replay(outcome) => {
                assert_eq!(outcome.prompt, q2.prompt);
                assert_eq!(outcome.session_id.as_ref(), Some(&id));
            }
            other => panic!("expected replay, got {other:?}"),
        }

        let turns: Vec<(String, String)> = store
            .detail(&id)
            .await
            .unwrap()
            .turns
            .into_iter()
            .map(|t| (t.question, t.answer))
            .collect();
        assert_eq!(turns, vec![("Q1".to_string(), "A1".to_string())]);
    }

    #[tokio::test]
    async fn replayed_final_answer_returns_stored_feedback() {
        let store = store();
        let plan = store.begin_turn(&start(1)).await.unwrap();
        let id = plan.session_id;
        let q1 = store.continue_turn(&id, "Only?").await.unwrap();
        let q1_id = current_prompt_id(&q1);
        let plan = store.begin_turn(&answer_to(&id, &q1_id, "yes")).await.unwrap();
        assert_eq!(plan.next, NextStep::Conclude);
        let concluded = store.conclude_turn(&id).await.unwrap();

        let plan = store.begin_turn(&answer_to(&id, &q1_id, "yes")).await.unwrap();
        assert_eq!(plan.next, NextStep::Replay(concluded));
    }

    #[tokio::test]
    async fn answer_to_unknown_prompt_is_stale() {
        let store = store();
        let id = started(&store, 3).await;
        let err = store
            .begin_turn(&answer_to(&id, &PromptId::from_raw("q_other"), "x"))
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::StalePrompt);
        assert!(store.detail(&id).await.unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn abandon_drops_only_fresh_sessions() {
        let store = store();
        let fresh = store.begin_turn(&start(3)).await.unwrap().session_id;
        let answered = started(&store, 3).await;
        let _ = store.begin_turn(&answer(&answered, "A1")).await.unwrap();

        store.abandon(&fresh).await;
        store.abandon(&answered).await;

        assert_eq!(store.detail(&fresh).await.unwrap_err(), DomainError::SessionNotFound);
        assert!(store.detail(&answered).await.is_ok());
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.history("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn empty_generated_question_is_an_error() {
        let store = store();
        let plan = store.begin_turn(&start(2)).await.unwrap();
        let err = store.continue_turn(&plan.session_id, "  ").await.unwrap_err();
        assert!(matches!(err, DomainError::Generation(_)));
    }

    #[tokio::test]
    async fn end_is_idempotent() {
        let store = store();
        let id = started(&store, 5).await;
        let first = store.end(&id).await.unwrap();
        let second = store.end(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unparseable_feedback_is_generation_error() {
        let store = InMemorySessions::new(
            Arc::new(ScriptedGenerator::new().with_feedback("no json here")),
            Temperatures::default(),
        );
        let id = started(&store, 5).await;
        let err = store.end(&id).await.unwrap_err();
        assert!(matches!(err, DomainError::Generation(_)));
        assert_eq!(store.active_count(), 1);
    }

    #[tokio::test]
    async fn history_lists_user_sessions() {
        let store = store();
        let id = started(&store, 1).await;
        let _ = store.begin_turn(&answer(&id, "only")).await.unwrap();
        let _ = store.conclude_turn(&id).await.unwrap();
        let _ = started(&store, 1).await;

        let items = store.history("u1").await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.overall_score.is_some()));
        assert!(store.history("someone-else").await.is_empty());
    }

    #[tokio::test]
    async fn invalid_start_is_rejected() {
        let store = store();
        let err = store.begin_turn(&start(0)).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }
}
