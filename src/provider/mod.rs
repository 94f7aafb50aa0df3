//! AI provider adapters.
//!
//! Exposes one uniform call contract over backends with incompatible
//! request/response shapes. Every failure is folded into a [`CallOutcome`]
//! with a human-readable message; nothing propagates past this boundary.

mod anthropic;
mod gemini;
mod ollama;
mod openai;

pub use ollama::{check_ollama_connection, OllamaStatus};

use crate::cost::CostMeter;
use crate::pricing;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default base URL for the local Ollama server.
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const XAI_BASE_URL: &str = "https://api.x.ai/v1";
const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic messages API (system message passed out-of-band).
    Anthropic,
    /// Google Gemini generateContent.
    Gemini,
    /// xAI Grok (OpenAI-compatible).
    Xai,
    /// DeepSeek (OpenAI-compatible).
    DeepSeek,
    /// Local Ollama server (OpenAI-compatible, no API key).
    Ollama,
}

impl Provider {
    /// All providers, in menu order.
    pub fn all() -> &'static [Provider] {
        &[
            Provider::OpenAi,
            Provider::Anthropic,
            Provider::Gemini,
            Provider::Xai,
            Provider::DeepSeek,
            Provider::Ollama,
        ]
    }

    /// Short name used in cost-log lines.
    pub fn label(self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Gemini => "Google Gemini",
            Provider::Xai => "xAI",
            Provider::DeepSeek => "DeepSeek",
            Provider::Ollama => "Ollama (Local)",
        }
    }

    /// Base URL of the provider's API (informational; the local provider's
    /// URL is configurable and lives in [`ProviderAdapter`]).
    pub fn base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Xai => XAI_BASE_URL,
            Provider::DeepSeek => DEEPSEEK_BASE_URL,
            Provider::Ollama => OLLAMA_DEFAULT_URL,
        }
    }

    /// Whether calls to this provider need an API key.
    pub fn requires_api_key(self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    /// Whether this provider/model combination accepts image input.
    pub fn supports_vision(self, model: &str) -> bool {
        let model = model.to_lowercase();
        let patterns: &[&str] = match self {
            Provider::OpenAi => &["gpt-4o", "gpt-4-turbo", "gpt-4.1", "gpt-4.5", "gpt-5", "o1", "o3", "o4"],
            Provider::Anthropic => &["claude"],
            Provider::Gemini => &["gemini"],
            Provider::Xai => &["grok-2-vision", "grok-vision"],
            // DeepSeek and local models do not take image input.
            Provider::DeepSeek | Provider::Ollama => &[],
        };
        patterns.iter().any(|p| model.contains(p))
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "OpenAI (ChatGPT)" => return Ok(Provider::OpenAi),
            "Anthropic (Claude)" => return Ok(Provider::Anthropic),
            "Google (Gemini)" => return Ok(Provider::Gemini),
            "xAI (Grok)" => return Ok(Provider::Xai),
            "Ollama (Local)" => return Ok(Provider::Ollama),
            _ => {}
        }
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" | "google" => Ok(Provider::Gemini),
            "xai" | "grok" => Ok(Provider::Xai),
            "deepseek" => Ok(Provider::DeepSeek),
            "ollama" | "local" => Ok(Provider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provider::OpenAi => "OpenAI (ChatGPT)",
            Provider::Anthropic => "Anthropic (Claude)",
            Provider::Gemini => "Google (Gemini)",
            Provider::Xai => "xAI (Grok)",
            Provider::DeepSeek => "DeepSeek",
            Provider::Ollama => "Ollama (Local)",
        };
        write!(f, "{}", name)
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Provider-agnostic chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One uniform chat call request.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub provider: Provider,
    pub model: String,
    pub messages: Vec<Message>,
    /// Ignored for the local provider.
    pub api_key: String,
    /// Document title for the cost log.
    pub document_title: Option<String>,
    /// Prompt name for the cost log.
    pub prompt_name: Option<String>,
}

/// The sole return contract of the adapter: a success flag and either the
/// generated text or a human-readable error message.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub success: bool,
    pub text: String,
}

impl CallOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self { success: true, text: text.into() }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self { success: false, text: text.into() }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// An image payload, already resized/compressed by the caller.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    /// MIME type, e.g. "image/jpeg".
    pub media_type: String,
}

/// Classified failure category, derived from provider error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing credentials.
    Auth,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Unknown or inactive model.
    ModelNotFound,
    /// Billing or payment problem.
    Billing,
    /// Request too large for the model's context window.
    ContextWindow,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Troubleshooting hint suitable for direct display.
    pub fn hint(self) -> &'static str {
        match self {
            ErrorKind::ModelNotFound => {
                "Invalid or inactive model. Try a different model, or refresh the model list."
            }
            ErrorKind::Auth => {
                "API key issue. Check the key in Settings, or generate a new one from your provider's console."
            }
            ErrorKind::RateLimit => {
                "Rate limit exceeded. Wait a few minutes and try again, or check your API usage limits."
            }
            ErrorKind::Billing => {
                "Billing issue. Check that billing is set up on your API account and the payment method is valid."
            }
            ErrorKind::ContextWindow => {
                "The request is too large for this model. Use a smaller chunk size or a model with a larger context window."
            }
            ErrorKind::Unknown => {
                "Check your API key, try a different model, and verify your internet connection."
            }
        }
    }
}

/// Classify a raw provider error message by substring.
///
/// Vendors give no structured codes at this layer, so the matching is
/// inherently fragile; it lives here and nowhere else.
pub fn classify_error(text: &str) -> ErrorKind {
    let t = text.to_lowercase();

    if t.contains("context window")
        || t.contains("context_length")
        || t.contains("maximum context")
        || t.contains("too many tokens")
    {
        ErrorKind::ContextWindow
    } else if t.contains("model")
        && (t.contains("404") || t.contains("not_found") || t.contains("not found") || t.contains("does not exist"))
    {
        ErrorKind::ModelNotFound
    } else if t.contains("401")
        || t.contains("unauthorized")
        || t.contains("authentication")
        || t.contains("api key")
    {
        ErrorKind::Auth
    } else if t.contains("429") || t.contains("rate limit") || t.contains("quota") {
        ErrorKind::RateLimit
    } else if t.contains("billing") || t.contains("payment") || t.contains("403") {
        ErrorKind::Billing
    } else {
        ErrorKind::Unknown
    }
}

/// Token usage and text for one successful backend call.
#[derive(Debug, Clone)]
pub(crate) struct BackendReply {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Uniform call contract between the orchestrator and the provider layer.
#[async_trait]
pub trait AiClient: Send + Sync {
    /// Issue one chat call. Never returns an error; failures are folded into
    /// the outcome.
    async fn call(&self, request: &CallRequest) -> CallOutcome;
}

/// Production adapter: dispatches to the real backend per provider and meters
/// cost per successful call.
pub struct ProviderAdapter {
    http: reqwest::Client,
    meter: CostMeter,
    ollama_base_url: String,
}

impl ProviderAdapter {
    /// Default timeout for provider API requests (5 minutes).
    const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Create an adapter logging costs through the given meter.
    pub fn new(meter: CostMeter) -> Self {
        Self::with_ollama_url(meter, OLLAMA_DEFAULT_URL)
    }

    /// Create an adapter with a custom local-server URL.
    pub fn with_ollama_url(meter: CostMeter, ollama_base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            meter,
            ollama_base_url: ollama_base_url.into(),
        }
    }

    fn check_api_key(&self, request: &CallRequest) -> Option<CallOutcome> {
        if request.provider.requires_api_key() && request.api_key.trim().is_empty() {
            return Some(CallOutcome::failure(format!(
                "{} API key is missing. Add one under Settings → AI Configuration.",
                request.provider
            )));
        }
        None
    }

    fn finish(
        &self,
        request: &CallRequest,
        provider_label: &str,
        reply: Result<BackendReply, String>,
    ) -> CallOutcome {
        match reply {
            Ok(reply) => {
                let cost = pricing::call_cost(
                    request.provider,
                    &request.model,
                    reply.prompt_tokens,
                    reply.completion_tokens,
                );
                self.meter.log(
                    provider_label,
                    &request.model,
                    cost,
                    request.document_title.as_deref(),
                    request.prompt_name.as_deref(),
                );
                CallOutcome::success(reply.text)
            }
            Err(text) => CallOutcome::failure(text),
        }
    }

    /// Call a vision-capable model with a pre-optimized image and a text
    /// prompt. Uses temperature 0 for deterministic transcription output.
    pub async fn call_vision(
        &self,
        request: &CallRequest,
        image: &ImagePayload,
        prompt: &str,
        max_tokens: u32,
    ) -> CallOutcome {
        if let Some(outcome) = self.check_api_key(request) {
            return outcome;
        }
        if !request.provider.supports_vision(&request.model) {
            return CallOutcome::failure(format!(
                "Provider '{}' does not support vision, or model '{}' is not vision-capable.",
                request.provider, request.model
            ));
        }

        let vision_request = CallRequest {
            prompt_name: Some("OCR Transcription".to_string()),
            ..request.clone()
        };

        let (label, reply) = match request.provider {
            Provider::OpenAi => (
                "OpenAI Vision",
                openai::vision(&request.api_key, None, &request.model, image, prompt, max_tokens, "OpenAI Vision")
                    .await,
            ),
            Provider::Xai => (
                "xAI Vision",
                openai::vision(
                    &request.api_key,
                    Some(XAI_BASE_URL),
                    &request.model,
                    image,
                    prompt,
                    max_tokens,
                    "xAI Vision",
                )
                .await,
            ),
            Provider::Anthropic => (
                "Anthropic Vision",
                anthropic::vision(&self.http, &request.api_key, &request.model, image, prompt, max_tokens).await,
            ),
            Provider::Gemini => (
                "Gemini Vision",
                gemini::vision(&self.http, &request.api_key, &request.model, image, prompt, max_tokens).await,
            ),
            Provider::DeepSeek | Provider::Ollama => unreachable!("filtered by supports_vision"),
        };

        self.finish(&vision_request, label, reply)
    }

    /// Validate an API key with a minimal one-turn call.
    pub async fn validate_api_key(&self, provider: Provider, model: &str, api_key: &str) -> CallOutcome {
        if provider.requires_api_key() && api_key.trim().is_empty() {
            return CallOutcome::failure("API key cannot be empty");
        }
        let request = CallRequest {
            provider,
            model: model.to_string(),
            messages: vec![Message::user("Hello")],
            api_key: api_key.to_string(),
            document_title: None,
            prompt_name: Some("API Key Validation".to_string()),
        };
        self.call(&request).await
    }
}

#[async_trait]
impl AiClient for ProviderAdapter {
    async fn call(&self, request: &CallRequest) -> CallOutcome {
        if let Some(outcome) = self.check_api_key(request) {
            return outcome;
        }

        let reply = match request.provider {
            Provider::OpenAi => {
                openai::chat(&request.api_key, None, &request.model, &request.messages, "OpenAI").await
            }
            Provider::Xai => {
                openai::chat(
                    &request.api_key,
                    Some(XAI_BASE_URL),
                    &request.model,
                    &request.messages,
                    "xAI (Grok)",
                )
                .await
            }
            Provider::DeepSeek => {
                openai::chat(
                    &request.api_key,
                    Some(DEEPSEEK_BASE_URL),
                    &request.model,
                    &request.messages,
                    "DeepSeek",
                )
                .await
            }
            Provider::Anthropic => {
                anthropic::chat(&self.http, &request.api_key, &request.model, &request.messages).await
            }
            Provider::Gemini => {
                gemini::chat(&self.http, &request.api_key, &request.model, &request.messages).await
            }
            Provider::Ollama => {
                ollama::chat(&self.http, &self.ollama_base_url, &request.model, &request.messages).await
            }
        };

        self.finish(request, request.provider.label(), reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display_name_roundtrip() {
        for provider in Provider::all() {
            let name = provider.to_string();
            assert_eq!(name.parse::<Provider>().unwrap(), *provider);
        }
    }

    #[test]
    fn test_provider_short_name_parse() {
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!("mystery".parse::<Provider>().is_err());
    }

    #[test]
    fn test_vision_support_patterns() {
        assert!(Provider::OpenAi.supports_vision("gpt-4o"));
        assert!(Provider::OpenAi.supports_vision("o3-mini"));
        assert!(!Provider::OpenAi.supports_vision("gpt-3.5-turbo"));
        assert!(Provider::Anthropic.supports_vision("claude-3-haiku"));
        assert!(!Provider::DeepSeek.supports_vision("deepseek-chat"));
        assert!(Provider::Xai.supports_vision("grok-2-vision-1212"));
        assert!(!Provider::Xai.supports_vision("grok-2-latest"));
    }

    #[test]
    fn test_classify_error_categories() {
        assert_eq!(classify_error("Error 401: unauthorized"), ErrorKind::Auth);
        assert_eq!(classify_error("429 Too Many Requests: rate limit"), ErrorKind::RateLimit);
        assert_eq!(classify_error("The model `gpt-9` does not exist"), ErrorKind::ModelNotFound);
        assert_eq!(classify_error("billing hard limit reached"), ErrorKind::Billing);
        assert_eq!(
            classify_error("prompt exceeds the maximum context length (context_length_exceeded)"),
            ErrorKind::ContextWindow
        );
        assert_eq!(classify_error("connection reset by peer"), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = ProviderAdapter::new(CostMeter::new(dir.path().join("cost.txt")));
        let request = CallRequest {
            provider: Provider::OpenAi,
            model: "gpt-4o".to_string(),
            messages: vec![Message::user("hi")],
            api_key: String::new(),
            document_title: None,
            prompt_name: None,
        };
        let outcome = adapter.call(&request).await;
        assert!(!outcome.success);
        assert!(outcome.text.contains("API key"));
        // No cost line for a failed call.
        assert!(!dir.path().join("cost.txt").exists());
    }
}
