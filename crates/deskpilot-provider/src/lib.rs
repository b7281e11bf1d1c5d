//! # DeskPilot Provider
//!
//! LLM provider implementations behind the core `Provider` contract:
//! - `OpenAiCompatProvider`: chat-completions-style HTTP client, usable
//!   against hosted APIs and local inference servers with the same surface
//! - `GeminiProvider`: generateContent-style HTTP client
//! - `FallbackProvider`: ordered local-first / cloud-fallback chain
//!
//! Providers are prompt-agnostic transport. The pipeline owns its prompts
//! and schemas; this crate's job is to deliver a JSON object back.

mod fallback;
mod gemini;
mod openai;

pub use fallback::FallbackProvider;
pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};

/// Extract the first complete JSON object from model output.
///
/// Models wrap JSON in prose or code fences often enough that a plain
/// `serde_json::from_str` on the raw text is not good enough.
pub(crate) fn extract_json(text: &str) -> Option<String> {
    for (start, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        if let Some(end) = find_json_object_end(text, start) {
            let candidate = &text[start..=end];
            if serde_json::from_str::<serde_json::Value>(candidate)
                .map(|v| v.is_object())
                .unwrap_or(false)
            {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

fn find_json_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        let abs = start + idx;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(abs);
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
    fn test_extract_json_from_fenced_output() {
        let text = "Sure, here is the result:\n```json\n{\"classification\": \"single\"}\n```";
        assert_eq!(
            extract_json(text).as_deref(),
            Some("{\"classification\": \"single\"}")
        );
    }

    #[test]
    fn test_extract_json_handles_nested_objects_and_braces_in_strings() {
        let text = r#"{"a": {"b": "contains } brace"}, "c": 1} trailing"#;
        let extracted = extract_json(text).unwrap();
        let value: serde_json::Value = serde_json::from_str(&extracted).unwrap();
        assert_eq!(value["a"]["b"], "contains } brace");
    }

    #[test]
    fn test_extract_json_none_without_object() {
        assert_eq!(extract_json("no json here"), None);
    }
}
