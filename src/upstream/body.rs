// ABOUTME: Request-body text field discovery and recursive response hydration
// ABOUTME: Walks OpenAI and Anthropic chat bodies; substitution applies only at string leaves
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Bridge Point

//! # Body Rewriting
//!
//! The interception path needs two JSON walks:
//!
//! * On the way out, find every textual prompt field in the request body —
//!   for OpenAI each `messages[].content` string and each content block of
//!   type `text`; for Anthropic additionally the top-level `system` —
//!   returned as JSON pointers so the caller can redact each one in turn.
//! * On the way back, substitute placeholders in every string leaf of the
//!   response, bounded in depth so hostile nesting cannot recurse away the
//!   stack.

use serde_json::Value;

use super::Provider;

/// Maximum nesting depth walked during response hydration
pub const MAX_HYDRATION_DEPTH: usize = 64;

/// JSON pointers to every redactable text field in a chat request body
#[must_use]
pub fn text_field_pointers(provider: Provider, body: &Value) -> Vec<String> {
    let mut pointers = Vec::new();

    if provider == Provider::Anthropic {
        match body.get("system") {
            Some(Value::String(_)) => pointers.push("/system".to_owned()),
            Some(Value::Array(blocks)) => {
                collect_block_pointers(blocks, "/system", &mut pointers);
            }
            _ => {}
        }
    }

    if let Some(Value::Array(messages)) = body.get("messages") {
        for (i, message) in messages.iter().enumerate() {
            match message.get("content") {
                Some(Value::String(_)) => {
                    pointers.push(format!("/messages/{i}/content"));
                }
                Some(Value::Array(blocks)) => {
                    collect_block_pointers(blocks, &format!("/messages/{i}/content"), &mut pointers);
                }
                _ => {}
            }
        }
    }

    pointers
}

/// Pointers to the `text` field of each block of type `text`
fn collect_block_pointers(blocks: &[Value], base: &str, pointers: &mut Vec<String>) {
    for (i, block) in blocks.iter().enumerate() {
        let is_text = block.get("type").and_then(Value::as_str) == Some("text");
        if is_text && block.get("text").is_some_and(Value::is_string) {
            pointers.push(format!("{base}/{i}/text"));
        }
    }
}

/// Read a text field addressed by a pointer from [`text_field_pointers`]
#[must_use]
pub fn get_text<'a>(body: &'a Value, pointer: &str) -> Option<&'a str> {
    body.pointer(pointer).and_then(Value::as_str)
}

/// Replace a text field addressed by a pointer
pub fn set_text(body: &mut Value, pointer: &str, text: String) {
    if let Some(slot) = body.pointer_mut(pointer) {
        *slot = Value::String(text);
    }
}

/// Substitute placeholders in every string leaf of `value`, depth-bounded.
///
/// Objects and arrays are walked; strings are rewritten through the
/// snapshot; numbers, booleans and nulls pass untouched. Object keys are
/// never rewritten.
pub fn hydrate_value(value: &mut Value, snapshot: &[(String, String)]) {
    hydrate_at_depth(value, snapshot, 0);
}

fn hydrate_at_depth(value: &mut Value, snapshot: &[(String, String)], depth: usize) {
    if depth > MAX_HYDRATION_DEPTH {
        return;
    }
    match value {
        Value::String(s) => {
            let hydrated = crate::session_map::substitute(s, snapshot);
            if hydrated != *s {
                *s = hydrated;
            }
        }
        Value::Array(items) => {
            for item in items {
                hydrate_at_depth(item, snapshot, depth + 1);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                hydrate_at_depth(item, snapshot, depth + 1);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_string_content() {
        let body = json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "be terse"},
                {"role": "user", "content": "my email is a@b.co"}
            ]
        });
        let pointers = text_field_pointers(Provider::OpenAi, &body);
        assert_eq!(
            pointers,
            vec!["/messages/0/content", "/messages/1/content"]
        );
        assert_eq!(get_text(&body, &pointers[1]), Some("my email is a@b.co"));
    }

    #[test]
    fn openai_content_blocks() {
        let body = json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "hello"},
                    {"type": "image_url", "image_url": {"url": "https://x"}},
                    {"type": "text", "text": "world"}
                ]
            }]
        });
        let pointers = text_field_pointers(Provider::OpenAi, &body);
        assert_eq!(
            pointers,
            vec!["/messages/0/content/0/text", "/messages/0/content/2/text"]
        );
    }

    #[test]
    fn anthropic_includes_system() {
        let body = json!({
            "system": "you are helpful",
            "messages": [{"role": "user", "content": "hi"}]
        });
        let pointers = text_field_pointers(Provider::Anthropic, &body);
        assert_eq!(pointers, vec!["/system", "/messages/0/content"]);

        // OpenAI walk ignores the top-level system field
        let pointers = text_field_pointers(Provider::OpenAi, &body);
        assert_eq!(pointers, vec!["/messages/0/content"]);
    }

    #[test]
    fn anthropic_system_blocks() {
        let body = json!({
            "system": [{"type": "text", "text": "cached preamble"}],
            "messages": []
        });
        let pointers = text_field_pointers(Provider::Anthropic, &body);
        assert_eq!(pointers, vec!["/system/0/text"]);
    }

    #[test]
    fn set_text_rewrites_in_place() {
        let mut body = json!({"messages": [{"role": "user", "content": "secret"}]});
        set_text(&mut body, "/messages/0/content", "[redacted]".to_owned());
        assert_eq!(body["messages"][0]["content"], "[redacted]");
    }

    #[test]
    fn hydration_rewrites_string_leaves_only() {
        let snapshot = vec![("\u{E000}aa\u{E001}".to_owned(), "a@b.co".to_owned())];
        let mut value = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "mail \u{E000}aa\u{E001} now"},
                "index": 0
            }],
            "usage": {"total_tokens": 12}
        });
        hydrate_value(&mut value, &snapshot);
        assert_eq!(
            value["choices"][0]["message"]["content"],
            "mail a@b.co now"
        );
        assert_eq!(value["usage"]["total_tokens"], 12);
    }

    #[test]
    fn hydration_is_depth_bounded() {
        let snapshot = vec![("[p]".to_owned(), "x".to_owned())];
        let mut value = json!("[p]");
        for _ in 0..(MAX_HYDRATION_DEPTH + 10) {
            value = json!([value]);
        }
        // Deeply nested leaf is left alone rather than overflowing the stack
        hydrate_value(&mut value, &snapshot);
        let mut cursor = &value;
        while let Some(first) = cursor.as_array().and_then(|a| a.first()) {
            cursor = first;
        }
        assert_eq!(cursor, &json!("[p]"));
    }
}
