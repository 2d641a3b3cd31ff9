//! Lenient parsing of generated feedback JSON.

use mockmate_core::InterviewFeedback;
use serde_json::Value;

use crate::generation::GenerationError;

/// Extract a JSON object from model output.
///
/// Accepts a bare object, an object wrapped in a ```` ``` ```` / ```` ```json ````
/// fence, or an object embedded in surrounding prose (outermost braces).
pub fn extract_json(raw: &str) -> Result<Value, GenerationError> {
    let mut text = raw.trim();
    if text.len() >= 6 && text.starts_with("```") && text.ends_with("```") {
        let inner = text[3..text.len() - 3].trim();
        text = match inner.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim(),
            _ => inner,
        };
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    let malformed = || GenerationError::Malformed {
        message: "response was not valid JSON".into(),
    };
    let start = text.find('{').ok_or_else(malformed)?;
    let end = text.rfind('}').ok_or_else(malformed)?;
    if end < start {
        return Err(malformed());
    }
    serde_json::from_str(&text[start..=end]).map_err(|_| malformed())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse model output into [`InterviewFeedback`].
///
/// `overall_score` (number or numeric string) and `summary` are required; list
/// fields keep only their string items.
pub fn parse_feedback(raw: &str) -> Result<InterviewFeedback, GenerationError> {
    let value = extract_json(raw)?;
    let Some(obj) = value.as_object() else {
        return Err(GenerationError::Malformed {
            message: "feedback is not a JSON object".into(),
        });
    };

    let overall_score = match obj.get("overall_score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| GenerationError::Malformed {
        message: "feedback missing score".into(),
    })?;

    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::Malformed {
            message: "feedback missing summary".into(),
        })?
        .trim()
        .to_string();

    Ok(InterviewFeedback {
        overall_score,
        summary,
        strengths: string_list(obj.get("strengths")),
        weaknesses: string_list(obj.get("weaknesses")),
        suggestions: string_list(obj.get("suggestions")),
    })
}
