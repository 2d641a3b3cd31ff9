//! Prompt templates for question and feedback generation.

use mockmate_core::Language;

use crate::generation::{GenerationPurpose, GenerationRequest};

/// Temperatures used for each purpose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Temperatures {
    /// Questions and follow-ups.
    pub question: f32,
    /// Final feedback.
    pub feedback: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            question: 0.4,
            feedback: 0.5,
        }
    }
}

/// One answered question, as fed back into prompts.
#[derive(Clone, Debug)]
pub struct TranscriptEntry<'a> {
    /// Question asked.
    pub question: &'a str,
    /// Candidate answer.
    pub answer: &'a str,
}

fn with_language(mut system: String, language: Language) -> String {
    if language == Language::Zh {
        system.push_str(" Respond in Simplified Chinese.");
    }
    system
}

fn transcript(entries: &[TranscriptEntry<'_>]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, e)| format!("Q{n}: {}\nA{n}: {}", e.question, e.answer, n = i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Opening question for a new session.
pub fn first_question(
    resume_summary: &str,
    job_description: &str,
    style: &str,
    language: Language,
    temps: Temperatures,
) -> GenerationRequest {
    let system = with_language(
        format!(
            "You are a {style} interviewer running a mock interview. \
             Ask exactly one concise opening question. Reply with the question text only."
        ),
        language,
    );
    let user = format!(
        "Resume summary:\n{resume_summary}\n\nJob description:\n{job_description}\n\n\
         Ask a question that connects the candidate's background to the role."
    );
    GenerationRequest {
        purpose: GenerationPurpose::FirstQuestion,
        system,
        user,
        temperature: temps.question,
    }
}

/// Next question, informed by the answers so far.
pub fn follow_up_question(
    history: &[TranscriptEntry<'_>],
    resume_summary: &str,
    job_description: &str,
    style: &str,
    language: Language,
    temps: Temperatures,
) -> GenerationRequest {
    let system = with_language(
        format!(
            "You are a {style} interviewer running a mock interview. \
             Based on the conversation so far, ask exactly one next question. \
             Dig deeper where the last answer was vague, otherwise move to a new topic. \
             Reply with the question text only."
        ),
        language,
    );
    let user = format!(
        "Resume summary:\n{resume_summary}\n\nJob description:\n{job_description}\n\n\
         Conversation so far:\n{}",
        transcript(history)
    );
    GenerationRequest {
        purpose: GenerationPurpose::FollowUp,
        system,
        user,
        temperature: temps.question,
    }
}

/// Final evaluation as a JSON object.
pub fn final_feedback(
    history: &[TranscriptEntry<'_>],
    style: &str,
    language: Language,
    temps: Temperatures,
) -> GenerationRequest {
    let system = with_language(
        "You evaluate mock interviews and provide constructive feedback. \
         Return JSON with `overall_score` (0-100 number), `summary`, `strengths`, \
         `weaknesses`, `suggestions`."
            .to_string(),
        language,
    );
    let text = transcript(history);
    let user = format!(
        "Interviewer style: {style}\nTranscript:\n{}",
        if text.is_empty() {
            "No answers were provided."
        } else {
            text.as_str()
        }
    );
    GenerationRequest {
        purpose: GenerationPurpose::Feedback,
        system,
        user,
        temperature: temps.feedback,
    }
}
