//! Tolerant JSON extraction from LLM response text.
//!
//! Models often wrap JSON in prose or markdown fences. Every caller that
//! expects structured output goes through `extract_json_block` instead of
//! slicing on `find('[')`/`rfind(']')` locally.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum JsonBlockError {
    #[error("No JSON {0} found in LLM response")]
    NotFound(&'static str),

    #[error("JSON parsing error: {0}")]
    Parsing(String),
}

/// Top-level JSON shape to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Array,
    Object,
}

impl JsonShape {
    fn delimiters(self) -> (char, char) {
        match self {
            Self::Array => ('[', ']'),
            Self::Object => ('{', '}'),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Find the first JSON value of `shape` in `response`.
///
/// Scans from the first opening delimiter to its balanced closing
/// delimiter, skipping delimiters inside string literals. When the value
/// is never closed, falls back to the span ending at the last closing
/// delimiter.
pub fn extract_json_block(response: &str, shape: JsonShape) -> Result<&str, JsonBlockError> {
    let (open, close) = shape.delimiters();
    let start = response
        .find(open)
        .ok_or(JsonBlockError::NotFound(shape.label()))?;

    if let Some(end) = balanced_end(&response[start..], open, close) {
        return Ok(&response[start..start + end]);
    }

    match response.rfind(close) {
        Some(end) if end > start => Ok(&response[start..=end]),
        _ => Err(JsonBlockError::NotFound(shape.label())),
    }
}

/// Extract and deserialize the first JSON value of `shape`.
pub fn parse_json_block<T: DeserializeOwned>(
    response: &str,
    shape: JsonShape,
) -> Result<T, JsonBlockError> {
    let block = extract_json_block(response, shape)?;
    serde_json::from_str(block).map_err(|e| JsonBlockError::Parsing(e.to_string()))
}

/// Byte length of the balanced value at the start of `text` (which begins
/// with `open`), or `None` if it is never closed.
fn balanced_end(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            _ if c == open => depth += 1,
            _ if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_array_from_fenced_response() {
        let text = "Here are the matches:\n```json\n[{\"a\": 1}]\n```\nDone.";
        assert_eq!(
            extract_json_block(text, JsonShape::Array).unwrap(),
            "[{\"a\": 1}]"
        );
    }

    #[test]
    fn stops_at_first_balanced_value() {
        let text = "[1, 2] and later [3]";
        assert_eq!(extract_json_block(text, JsonShape::Array).unwrap(), "[1, 2]");
    }

    #[test]
    fn ignores_brackets_inside_strings() {
        let text = r#"Result: {"note": "uses } and \" quotes", "n": 1} trailing"#;
        assert_eq!(
            extract_json_block(text, JsonShape::Object).unwrap(),
            r#"{"note": "uses } and \" quotes", "n": 1}"#
        );
    }

    #[test]
    fn unclosed_value_falls_back_to_last_delimiter() {
        let text = "[[1, 2] and nothing else";
        assert_eq!(extract_json_block(text, JsonShape::Array).unwrap(), "[[1, 2]");
        let broken = "{ \"a\": { } ";
        assert_eq!(extract_json_block(broken, JsonShape::Object).unwrap(), "{ \"a\": { }");
    }

    #[test]
    fn missing_json_is_an_error() {
        assert_eq!(
            extract_json_block("No JSON here at all.", JsonShape::Array),
            Err(JsonBlockError::NotFound("array"))
        );
    }

    #[test]
    fn parse_reports_invalid_json() {
        let result: Result<Vec<u32>, _> = parse_json_block("[1, two]", JsonShape::Array);
        assert!(matches!(result, Err(JsonBlockError::Parsing(_))));
    }
}
