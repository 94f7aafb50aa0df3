//! Google Gemini generateContent backend.
//!
//! Gemini names the assistant role "model" and takes the system prompt as a
//! separate `systemInstruction` field. Token counts come back in
//! `usageMetadata`; when absent a nominal usage is assumed so the call still
//! lands in the cost log.

use super::{anthropic::split_system, BackendReply, ImagePayload, Message};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use tracing::warn;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// Assumed usage when the response carries no usageMetadata.
const FALLBACK_PROMPT_TOKENS: u32 = 1000;
const FALLBACK_COMPLETION_TOKENS: u32 = 500;

fn wire_role(message: &Message) -> &'static str {
    match message.role {
        super::Role::Assistant => "model",
        _ => "user",
    }
}

fn rewrite_error(status: u16, detail: &str) -> String {
    match status {
        400 if detail.contains("API_KEY_INVALID") || detail.contains("API key not valid") => {
            "Gemini error: invalid API key. Generate a new key at https://aistudio.google.com/apikey".to_string()
        }
        404 => format!(
            "Gemini error: model not found ({}). Refresh the model list or pick a current Gemini model.",
            detail
        ),
        429 => "Gemini error: rate limit or quota exceeded. Wait a few minutes and try again.".to_string(),
        _ => format!("Gemini error: {} {}", status, detail),
    }
}

async fn send(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    body: serde_json::Value,
) -> Result<BackendReply, String> {
    let url = format!("{}/{}:generateContent?key={}", API_BASE, model, api_key);

    let response = http
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| format!("Gemini error: {}", e))?;

    let status = response.status();
    let payload: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("Gemini error: {}", e))?;

    if !status.is_success() {
        let detail = payload
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .unwrap_or("request failed");
        return Err(rewrite_error(status.as_u16(), detail));
    }

    let text = payload
        .pointer("/candidates/0/content/parts")
        .and_then(|parts| parts.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        // A safety block comes back as a response with no candidates.
        let reason = payload
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
            .unwrap_or("empty response");
        return Err(format!("Gemini error: {}", reason));
    }

    let prompt_tokens = payload
        .pointer("/usageMetadata/promptTokenCount")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);
    let completion_tokens = payload
        .pointer("/usageMetadata/candidatesTokenCount")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);
    if prompt_tokens.is_none() {
        warn!("Gemini response missing usageMetadata, assuming nominal token counts");
    }

    Ok(BackendReply {
        text,
        prompt_tokens: prompt_tokens.unwrap_or(FALLBACK_PROMPT_TOKENS),
        completion_tokens: completion_tokens.unwrap_or(FALLBACK_COMPLETION_TOKENS),
    })
}

/// One chat call against generateContent.
pub(crate) async fn chat(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    messages: &[Message],
) -> Result<BackendReply, String> {
    let (system, turns) = split_system(messages);

    let contents: Vec<serde_json::Value> = turns
        .iter()
        .map(|m| json!({ "role": wire_role(m), "parts": [{ "text": m.content }] }))
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": { "temperature": 0.7 },
    });
    if let Some(system) = system {
        body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    send(http, api_key, model, body).await
}

/// One vision call: a single user turn carrying the text prompt and the
/// image as inline base64 data. Temperature 0 for deterministic output.
pub(crate) async fn vision(
    http: &reqwest::Client,
    api_key: &str,
    model: &str,
    image: &ImagePayload,
    prompt: &str,
    max_tokens: u32,
) -> Result<BackendReply, String> {
    let body = json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": image.media_type,
                        "data": STANDARD.encode(&image.data),
                    },
                },
            ],
        }],
        "generationConfig": { "temperature": 0.0, "maxOutputTokens": max_tokens },
    });

    send(http, api_key, model, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    #[test]
    fn test_assistant_maps_to_model_role() {
        assert_eq!(wire_role(&Message::assistant("a")), "model");
        assert_eq!(wire_role(&Message::user("u")), "user");
        // System turns never reach wire_role, but a stray one maps to user.
        assert_eq!(
            wire_role(&Message { role: Role::System, content: "s".into() }),
            "user"
        );
    }

    #[test]
    fn test_error_rewrites() {
        assert!(rewrite_error(400, "API key not valid").contains("aistudio.google.com"));
        assert!(rewrite_error(404, "models/gemini-0.1 not found").contains("model not found"));
        assert!(rewrite_error(429, "quota").contains("rate limit"));
        assert!(rewrite_error(500, "internal").contains("500"));
    }
}
