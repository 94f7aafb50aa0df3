//! Anthropic messages backend.
//!
//! The messages API takes the system prompt as a top-level field rather than
//! a conversation turn, so the system message is split out before sending.

use super::{BackendReply, ImagePayload, Message, Role};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

const CHAT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Split the system prompt out of a conversation.
///
/// Returns the first system message's content (if any) and the remaining
/// user/assistant turns in their original order. No turn is dropped or
/// duplicated.
pub(crate) fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system = None;
    let mut turns = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::System => {
                if system.is_none() {
                    system = Some(message.content.clone());
                }
            }
            _ => turns.push(message),
        }
    }
    (system, turns)
}

async fn send(
    http: &reqwest::Client,
    api_key: &str,
    body: serde_json::Value,
) -> Result<BackendReply, String> {
    let response = http
        .post(API_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION)
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Anthropic error: {}", e))?;

    let status = response.status();
    let payload = response
        .text()
        .await
        .map_err(|e| format!("Anthropic error: {}", e))?;

    if !status.is_success() {
        // Surface the API's own message when it gives one.
        let detail = serde_json::from_str::<serde_json::Value>(&payload)
            .ok()
            .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(payload);
        return Err(format!("Anthropic error: {} {}", status.as_u16(), detail));
    }

    let parsed: MessagesResponse =
        serde_json::from_str(&payload).map_err(|e| format!("Anthropic error: {}", e))?;

    let text = parsed
        .content
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        return Err("Anthropic error: empty response".to_string());
    }

    Ok(BackendReply {
        text,
        prompt_tokens: parsed.usage.input_tokens,
        completion_tokens: parsed.usage.output_tokens,
    })
}

/// One chat call against the messages API.
pub(crate) async fn chat(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    messages: &[Message],
) -> Result<BackendReply, String> {
    let (system, turns) = split_system(messages);

    let wire_messages: Vec<serde_json::Value> = turns
        .iter()
        .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();

    let mut body = json!({
        "model": model,
        "max_tokens": CHAT_MAX_TOKENS,
        "temperature": 0.7,
        "messages": wire_messages,
    });
    if let Some(system) = system {
        body["system"] = json!(system);
    }

    send(http, api_key, body).await
}

/// One vision call: a single user turn with a base64 image block followed by
/// the text prompt. Temperature 0 for deterministic transcription.
pub(crate) async fn vision(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    image: &ImagePayload,
    prompt: &str,
    max_tokens: u32,
) -> Result<BackendReply, String> {
    let body = json!({
        "model": model,
        "max_tokens": max_tokens,
        "temperature": 0.0,
        "messages": [{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type,
                        "data": STANDARD.encode(&image.data),
                    },
                },
                { "type": "text", "text": prompt },
            ],
        }],
    });

    send(http, api_key, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_system_extracts_first_system_turn() {
        let messages = vec![
            Message::system("S"),
            Message::user("u1"),
            Message::assistant("a1"),
            Message::user("u2"),
        ];
        let (system, turns) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("S"));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].content, "u1");
        assert_eq!(turns[1].content, "a1");
        assert_eq!(turns[2].content, "u2");
        assert!(turns.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_split_system_without_system_turn() {
        let messages = vec![Message::user("hello")];
        let (system, turns) = split_system(&messages);
        assert!(system.is_none());
        assert_eq!(turns.len(), 1);
    }
}
