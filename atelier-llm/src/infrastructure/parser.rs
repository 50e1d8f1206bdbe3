//! Tolerant parsing of LLM outputs
//!
//! Models wrap JSON in markdown fences, prepend commentary, and occasionally
//! drop a closing brace. The extractor tries progressively looser
//! strategies before a strict parse:
//!
//! 1) the full trimmed content as JSON,
//! 2) a ```json fenced block,
//! 3) any fenced block,
//! 4) the first valid JSON value found in the text,
//! 5) a single brace re-balance of the best candidate.
//!
//! Artifact extraction additionally accepts per-file fenced code blocks when
//! no JSON object survives.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::LlmError;

/// Utilities for extracting structured data from LLM responses.
pub struct ResponseParser;

impl ResponseParser {
    /// Parse a JSON value from an LLM response.
    pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, LlmError> {
        let trimmed = content.trim();
        if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
            return Ok(parsed);
        }

        if let Some(json) = Self::extract_fenced_json(trimmed) {
            if let Ok(parsed) = serde_json::from_str::<T>(&json) {
                return Ok(parsed);
            }
        }

        if let Some(json) = Self::extract_any_fenced_code(trimmed) {
            if let Ok(parsed) = serde_json::from_str::<T>(&json) {
                return Ok(parsed);
            }
        }

        if let Some(json) = Self::extract_first_json_value(trimmed) {
            if let Ok(parsed) = serde_json::from_str::<T>(&json) {
                return Ok(parsed);
            }
        }

        if let Some(json) = Self::rebalance_braces(trimmed) {
            if let Ok(parsed) = serde_json::from_str::<T>(&json) {
                return Ok(parsed);
            }
        }

        Err(LlmError::InvalidResponse(
            "Failed to extract valid JSON from LLM response".to_string(),
        ))
    }

    /// Extract a `{filepath -> content}` artifact map from a response.
    ///
    /// Only string-valued entries whose keys look like file paths are kept;
    /// when no JSON object yields files, per-file fenced code blocks are
    /// accepted as a fallback.
    pub fn parse_artifacts(content: &str) -> Option<BTreeMap<String, String>> {
        if let Ok(value) = Self::parse_json::<serde_json::Value>(content) {
            if let Some(files) = Self::file_map_from_value(&value) {
                return Some(files);
            }
        }

        let files = Self::extract_file_blocks(content);
        if files.is_empty() {
            None
        } else {
            debug!(count = files.len(), "Extracted artifacts from code blocks");
            Some(files)
        }
    }

    fn file_map_from_value(value: &serde_json::Value) -> Option<BTreeMap<String, String>> {
        let object = value.as_object()?;
        let files: BTreeMap<String, String> = object
            .iter()
            .filter(|(key, _)| Self::looks_like_path(key))
            .filter_map(|(key, val)| val.as_str().map(|s| (key.clone(), s.to_string())))
            .collect();

        if files.is_empty() {
            None
        } else {
            Some(files)
        }
    }

    fn looks_like_path(key: &str) -> bool {
        !key.contains(char::is_whitespace) && (key.contains('/') || key.contains('.'))
    }

    /// Extract a ```json fenced code block.
    pub fn extract_fenced_json(content: &str) -> Option<String> {
        Self::extract_fenced_block(content, Some("json"))
    }

    /// Extract any fenced code block.
    pub fn extract_any_fenced_code(content: &str) -> Option<String> {
        Self::extract_fenced_block(content, None)
    }

    /// Extract the first valid JSON value (object or array) from text.
    ///
    /// Uses `serde_json::Deserializer` to detect a valid JSON prefix.
    pub fn extract_first_json_value(content: &str) -> Option<String> {
        for (idx, ch) in content.char_indices() {
            if ch == '{' || ch == '[' {
                let candidate = &content[idx..];
                let mut de =
                    serde_json::Deserializer::from_str(candidate).into_iter::<serde_json::Value>();
                if let Some(Ok(_value)) = de.next() {
                    let end = de.byte_offset();
                    if end > 0 && end <= candidate.len() {
                        return Some(candidate[..end].to_string());
                    }
                }
            }
        }
        None
    }

    /// Append missing closing braces to the tail of the first JSON object.
    ///
    /// Applied at most once, per the output contract: deeper damage means
    /// the response is rejected, not repaired.
    fn rebalance_braces(content: &str) -> Option<String> {
        let start = content.find('{')?;
        let candidate = &content[start..];

        let mut depth: i32 = 0;
        let mut in_string = false;
        let mut escaped = false;
        for ch in candidate.chars() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '{' if !in_string => depth += 1,
                '}' if !in_string => depth -= 1,
                _ => {}
            }
        }

        if depth > 0 && depth <= 2 {
            let mut repaired = candidate.trim_end().to_string();
            for _ in 0..depth {
                repaired.push('}');
            }
            Some(repaired)
        } else {
            None
        }
    }

    /// Extract per-file fenced blocks.
    ///
    /// Accepts a path on the fence info line (<code>```backend/main.py</code>)
    /// or as the first line inside a language-tagged fence.
    fn extract_file_blocks(content: &str) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        let fence = "```";
        let mut search = content;

        while let Some(start) = search.find(fence) {
            let after_start = &search[start + fence.len()..];
            let Some(line_end) = after_start.find('\n') else {
                break;
            };
            let info = after_start[..line_end].trim();
            let body = &after_start[line_end + 1..];
            let Some(end) = body.find(fence) else {
                break;
            };
            let block = &body[..end];

            if Self::looks_like_path(info) && !info.is_empty() {
                // Path carried on the fence line
                files.insert(info.to_string(), block.trim().to_string());
            } else if let Some(first_line_end) = block.find('\n') {
                let first_line = block[..first_line_end].trim();
                if Self::looks_like_path(first_line) && !first_line.contains(' ') {
                    files.insert(
                        first_line.to_string(),
                        block[first_line_end + 1..].trim().to_string(),
                    );
                }
            }

            search = &body[end + fence.len()..];
        }

        files
    }

    fn extract_fenced_block(content: &str, language: Option<&str>) -> Option<String> {
        let fence = "```";
        let mut search = content;

        loop {
            let start = search.find(fence)?;
            let after_start = &search[start + fence.len()..];

            let (lang_tag, rest) = if let Some(line_end) = after_start.find('\n') {
                let tag = after_start[..line_end].trim();
                (tag, &after_start[line_end + 1..])
            } else {
                return None;
            };

            if let Some(expected) = language {
                if !lang_tag.eq_ignore_ascii_case(expected) {
                    // Continue scanning after this fence
                    search = after_start;
                    continue;
                }
            }

            let end = rest.find(fence)?;
            let block = rest[..end].trim().to_string();
            return Some(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_direct() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            key: String,
        }

        let json = r#"{ "key": "value" }"#;
        let parsed: Payload = ResponseParser::parse_json(json).unwrap();
        assert_eq!(
            parsed,
            Payload {
                key: "value".into()
            }
        );
    }

    #[test]
    fn test_parse_json_fenced_json() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            ok: bool,
        }

        let content = r#"
Here is the result:
```json
{ "ok": true }
```
"#;
        let parsed: Payload = ResponseParser::parse_json(content).unwrap();
        assert_eq!(parsed, Payload { ok: true });
    }

    #[test]
    fn test_parse_json_any_fence() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            count: u32,
        }

        let content = "```text\n{ \"count\": 7 }\n```";
        let parsed: Payload = ResponseParser::parse_json(content).unwrap();
        assert_eq!(parsed, Payload { count: 7 });
    }

    #[test]
    fn test_parse_json_first_value() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Payload {
            status: String,
        }

        let content = "Some text before {\"status\":\"ok\"} trailing text";
        let parsed: Payload = ResponseParser::parse_json(content).unwrap();
        assert_eq!(
            parsed,
            Payload {
                status: "ok".into()
            }
        );
    }

    #[test]
    fn test_parse_json_rebalances_one_missing_brace() {
        let content = r#"{"files": {"a.py": "print(1)""#;
        let value: serde_json::Value = ResponseParser::parse_json(content).unwrap();
        assert_eq!(value["files"]["a.py"], "print(1)");
    }

    #[test]
    fn test_parse_json_rejects_garbage() {
        let result: Result<serde_json::Value, _> = ResponseParser::parse_json("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_artifacts_object() {
        let content = r#"{"backend/main.py": "print('hi')", "summary": "two endpoints added"}"#;
        let files = ResponseParser::parse_artifacts(content).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files["backend/main.py"], "print('hi')");
    }

    #[test]
    fn test_parse_artifacts_skips_non_string_values() {
        let content = r#"{"backend/main.py": "code", "meta.json": {"nested": true}}"#;
        let files = ResponseParser::parse_artifacts(content).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("backend/main.py"));
    }

    #[test]
    fn test_parse_artifacts_from_file_blocks() {
        let content = "Here you go:\n```python\nbackend/main.py\nprint('hello')\n```\n";
        let files = ResponseParser::parse_artifacts(content).unwrap();
        assert_eq!(files["backend/main.py"], "print('hello')");
    }

    #[test]
    fn test_parse_artifacts_none_for_prose() {
        assert!(ResponseParser::parse_artifacts("I could not generate files.").is_none());
    }

    #[test]
    fn test_extract_fenced_json_none() {
        let content = "no fences here";
        assert!(ResponseParser::extract_fenced_json(content).is_none());
    }
}
