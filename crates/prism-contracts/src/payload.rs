use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("response text is empty")]
    Empty,
    #[error("response is not valid JSON: {0}")]
    NotJson(String),
    #[error("response JSON is not an object")]
    NotObject,
}

/// Pulls a JSON object out of free-form model output.
///
/// Accepts a bare object, an object inside a ```` ```json ```` or plain
/// ```` ``` ```` fence anywhere in the text, or an object surrounded by prose.
/// Either the whole object parses or the call fails; nothing partial is
/// returned.
pub fn extract_structured_payload(text: &str) -> Result<Map<String, Value>, PayloadError> {
    let raw = strip_code_fence(text);
    if raw.is_empty() {
        return Err(PayloadError::Empty);
    }

    let mut candidates = vec![raw.as_str()];
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            candidates.push(&raw[start..=end]);
        }
    }

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => return Ok(object),
            Ok(_) => last_error = Some(PayloadError::NotObject),
            Err(err) => {
                if last_error.is_none() {
                    last_error = Some(PayloadError::NotJson(err.to_string()));
                }
            }
        }
    }
    Err(last_error.unwrap_or(PayloadError::NotObject))
}

pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if let Some((_, tail)) = raw.split_once("```json") {
        return tail
            .split("```")
            .next()
            .unwrap_or(tail)
            .trim()
            .to_string();
    }
    let mut parts = raw.split("```");
    if let (Some(_), Some(body)) = (parts.next(), parts.next()) {
        return body.trim().to_string();
    }
    raw.to_string()
}
