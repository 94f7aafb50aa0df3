//! OpenAI-compatible chat backend.
//!
//! Also serves xAI, DeepSeek and Ollama by pointing the client at their
//! OpenAI-compatible base URLs.

use super::{BackendReply, ImagePayload, Message, Role};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageUrlArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;

/// Default timeout for chat API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a chat client with configured timeout, optionally pointed at an
/// OpenAI-compatible base URL.
pub(crate) fn create_client(api_key: &str, api_base: Option<&str>) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client");

    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = api_base {
        config = config.with_api_base(base);
    }

    Client::with_config(config).with_http_client(http_client)
}

fn to_request_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, String> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let converted: ChatCompletionRequestMessage = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(|e| format!("Failed to build message: {}", e))?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(|e| format!("Failed to build message: {}", e))?
                .into(),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.clone())
                .build()
                .map_err(|e| format!("Failed to build message: {}", e))?
                .into(),
        };
        out.push(converted);
    }
    Ok(out)
}

/// Newer OpenAI model families reject `max_tokens` in favor of
/// `max_completion_tokens`.
fn uses_max_completion_tokens(model: &str) -> bool {
    let model = model.to_lowercase();
    ["gpt-5", "o1", "o3", "o4"].iter().any(|p| model.starts_with(p))
}

/// One chat completion call against an OpenAI-compatible endpoint.
pub(crate) async fn chat(
    api_key: &str,
    api_base: Option<&str>,
    model: &str,
    messages: &[Message],
    label: &str,
) -> Result<BackendReply, String> {
    let client = create_client(api_key, api_base);
    let request_messages = to_request_messages(messages)?;

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(request_messages)
        .temperature(0.7)
        .build()
        .map_err(|e| format!("{} error: {}", label, e))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(|e| format!("{} error: {}", label, e))?;

    let text = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_ref())
        .ok_or_else(|| format!("{} error: empty response", label))?
        .clone();

    let (prompt_tokens, completion_tokens) = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    Ok(BackendReply { text, prompt_tokens, completion_tokens })
}

/// One vision call: a single user turn holding a text part and a base64 data
/// URL image part. Temperature 0 for deterministic transcription.
pub(crate) async fn vision(
    api_key: &str,
    api_base: Option<&str>,
    model: &str,
    image: &ImagePayload,
    prompt: &str,
    max_tokens: u32,
    label: &str,
) -> Result<BackendReply, String> {
    let client = create_client(api_key, api_base);

    let data_url = format!("data:{};base64,{}", image.media_type, STANDARD.encode(&image.data));

    let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
        ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()
            .map_err(|e| format!("{} error: {}", label, e))?
            .into(),
        ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .build()
                    .map_err(|e| format!("{} error: {}", label, e))?,
            )
            .build()
            .map_err(|e| format!("{} error: {}", label, e))?
            .into(),
    ];

    let user_message = ChatCompletionRequestUserMessageArgs::default()
        .content(parts)
        .build()
        .map_err(|e| format!("{} error: {}", label, e))?;

    let mut builder = CreateChatCompletionRequestArgs::default();
    builder
        .model(model)
        .messages(vec![ChatCompletionRequestMessage::from(user_message)])
        .temperature(0.0);
    if uses_max_completion_tokens(model) {
        builder.max_completion_tokens(max_tokens);
    } else {
        builder.max_tokens(max_tokens);
    }
    let request = builder.build().map_err(|e| format!("{} error: {}", label, e))?;

    let response = client
        .chat()
        .create(request)
        .await
        .map_err(|e| format!("{} error: {}", label, e))?;

    let text = response
        .choices
        .first()
        .and_then(|c| c.message.content.as_ref())
        .ok_or_else(|| format!("{} error: empty response", label))?
        .clone();

    let (prompt_tokens, completion_tokens) = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    Ok(BackendReply { text, prompt_tokens, completion_tokens })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_completion_tokens_model_families() {
        assert!(uses_max_completion_tokens("gpt-5-mini"));
        assert!(uses_max_completion_tokens("o1-preview"));
        assert!(uses_max_completion_tokens("o3"));
        assert!(!uses_max_completion_tokens("gpt-4o"));
        assert!(!uses_max_completion_tokens("gpt-4-turbo"));
    }

    #[test]
    fn test_message_conversion_preserves_order() {
        let messages = vec![
            Message::system("s"),
            Message::user("u1"),
            Message::assistant("a1"),
            Message::user("u2"),
        ];
        let converted = to_request_messages(&messages).unwrap();
        assert_eq!(converted.len(), 4);
    }
}
