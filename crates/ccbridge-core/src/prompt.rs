//! Prompt building from OpenAI request bodies.
//!
//! The CLI takes one flat prompt on stdin, so a conversation is rendered as
//! blank-line separated paragraphs with role markers.

use serde_json::Value;

use crate::openai::ChatMessage;

/// Render chat messages into a single prompt.
///
/// Unknown roles (`tool`, `function`, ...) are dropped.
pub fn messages_to_prompt(messages: &[ChatMessage]) -> String {
    let parts: Vec<String> = messages
        .iter()
        .filter_map(|msg| {
            let content = msg
                .content
                .as_ref()
                .map(crate::openai::MessageContent::to_text)
                .unwrap_or_default();
            match msg.role.as_str() {
                "system" => Some(format!("[System: {content}]")),
                "user" => match msg.name.as_deref().filter(|n| !n.is_empty()) {
                    Some(name) => Some(format!("{name}: {content}")),
                    None => Some(content),
                },
                "assistant" => Some(format!("[Previous assistant response: {content}]")),
                _ => None,
            }
        })
        .collect();
    parts.join("\n\n")
}

/// Render the legacy `prompt` field.
///
/// Strings pass through, arrays keep their string items joined by newlines,
/// anything else is rendered as JSON text.
pub fn legacy_prompt_text(prompt: &Value) -> String {
    match prompt {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::openai::MessageContent;

    fn msg(role: &str, content: &str, name: Option<&str>) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(MessageContent::Text(content.to_string())),
            name: name.map(String::from),
        }
    }

    #[test]
    fn renders_roles() {
        let prompt = messages_to_prompt(&[
            msg("system", "Be brief.", None),
            msg("user", "Hi", None),
            msg("assistant", "Hello!", None),
            msg("user", "What's up?", Some("alice")),
        ]);
        assert_eq!(
            prompt,
            "[System: Be brief.]\n\nHi\n\n[Previous assistant response: Hello!]\n\nalice: What's up?"
        );
    }

    #[test]
    fn drops_unknown_roles() {
        let prompt = messages_to_prompt(&[msg("tool", "result", None), msg("user", "ok", None)]);
        assert_eq!(prompt, "ok");
    }

    #[test]
    fn empty_name_is_ignored() {
        assert_eq!(messages_to_prompt(&[msg("user", "x", Some(""))]), "x");
    }

    #[test]
    fn missing_content_renders_empty() {
        let message = ChatMessage {
            role: "assistant".into(),
            content: None,
            name: None,
        };
        assert_eq!(
            messages_to_prompt(&[message]),
            "[Previous assistant response: ]"
        );
    }

    #[test]
    fn legacy_prompt_forms() {
        assert_eq!(legacy_prompt_text(&serde_json::json!("hello")), "hello");
        assert_eq!(
            legacy_prompt_text(&serde_json::json!(["a", 1, "b"])),
            "a\nb"
        );
        assert_eq!(legacy_prompt_text(&serde_json::json!(42)), "42");
        assert_eq!(legacy_prompt_text(&Value::Null), "");
    }
}
