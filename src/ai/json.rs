//! Parse-or-fail boundary for structured oracle output
//!
//! Oracle text is accepted as a bare JSON object, a fenced code block, or
//! prose around an object. The first well-formed JSON object wins and must
//! deserialize into the requested type; anything else is an error.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JsonBoundaryError {
    #[error("no well-formed JSON object in oracle output: {snippet}")]
    NoJsonObject { snippet: String },

    #[error("JSON object does not match expected structure: {0}")]
    SchemaMismatch(#[from] serde_json::Error),
}

/// Parse the first well-formed JSON object in `text` as `T`.
pub fn parse_llm_json_object<T: DeserializeOwned>(text: &str) -> Result<T, JsonBoundaryError> {
    let object = first_json_object(text).ok_or_else(|| JsonBoundaryError::NoJsonObject {
        snippet: snippet(text),
    })?;
    Ok(serde_json::from_value(object)?)
}

/// Candidate `{` positions tried before giving up on a reply.
const MAX_OBJECT_STARTS: usize = 32;

/// Locate the first `{` from which a complete JSON object can be read.
///
/// Scanning stops when a candidate runs off the end of the text: the reply
/// was truncated, and any object nested inside it is not the answer.
pub fn first_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for (start, _) in trimmed.match_indices('{').take(MAX_OBJECT_STARTS) {
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => return Some(value),
            Some(Err(e)) if e.is_eof() => return None,
            _ => {}
        }
    }
    None
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        intent: String,
    }

    #[test]
    fn test_parse_clean_json() {
        let probe: Probe = parse_llm_json_object(r#"{"intent": "compare"}"#).unwrap();
        assert_eq!(probe.intent, "compare");
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "```json\n{\"intent\": \"growth\"}\n```";
        let probe: Probe = parse_llm_json_object(text).unwrap();
        assert_eq!(probe.intent, "growth");
    }

    #[test]
    fn test_parse_json_surrounded_by_prose() {
        let text = "Sure! Here is the plan: {\"intent\": \"affected\"} Let me know.";
        let probe: Probe = parse_llm_json_object(text).unwrap();
        assert_eq!(probe.intent, "affected");
    }

    #[test]
    fn test_first_object_wins() {
        let text = r#"{"intent": "first"} and later {"intent": "second"}"#;
        let probe: Probe = parse_llm_json_object(text).unwrap();
        assert_eq!(probe.intent, "first");
    }

    #[test]
    fn test_skips_malformed_prefix() {
        let text = r#"draft {intent: oops} final {"intent": "ok"}"#;
        let probe: Probe = parse_llm_json_object(text).unwrap();
        assert_eq!(probe.intent, "ok");
    }

    #[test]
    fn test_no_json_is_error() {
        let err = parse_llm_json_object::<Probe>("I could not find anything").unwrap_err();
        assert!(matches!(err, JsonBoundaryError::NoJsonObject { .. }));
    }

    #[test]
    fn test_wrong_shape_is_error() {
        let err = parse_llm_json_object::<Probe>(r#"{"other": 1}"#).unwrap_err();
        assert!(matches!(err, JsonBoundaryError::SchemaMismatch(_)));
    }

    #[test]
    fn test_truncated_reply_stops_scanning() {
        let text = r#"Plan: {"intent": "compare", "calls": [{"functionName": "x"}"#;
        assert!(first_json_object(text).is_none());
    }

    #[test]
    fn test_brace_flood_is_rejected() {
        let mut text = "{x".repeat(10_000);
        text.push_str(r#"{"intent": "late"}"#);
        assert!(first_json_object(&text).is_none());
    }

    #[test]
    fn test_array_is_not_an_object() {
        assert!(first_json_object("[1, 2, 3]").is_none());
    }
}
