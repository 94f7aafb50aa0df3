//! Local Ollama backend.
//!
//! The server is reached over its OpenAI-compatible endpoint, but a cheap
//! `/api/tags` probe runs first so connection problems produce actionable
//! guidance instead of an opaque HTTP error. Local calls are free; they are
//! still metered at $0 so every run appears in the cost log.

use super::{openai, BackendReply, Message};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    name: String,
}

/// Result of probing a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaStatus {
    pub reachable: bool,
    pub message: String,
    /// Names of locally installed models, when reachable.
    pub models: Vec<String>,
}

fn unreachable_guidance(base_url: &str, error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!(
            "Ollama server at {} did not respond within {} seconds. \
             It may be busy loading a model; wait a moment and try again.",
            base_url, PROBE_TIMEOUT_SECS
        )
    } else {
        format!(
            "Cannot connect to Ollama server at {}.\n\n\
             Make sure Ollama is installed and running:\n\
             1. Install from https://ollama.com\n\
             2. Start the server: ollama serve\n\
             3. Pull a model: ollama pull llama3.2",
            base_url
        )
    }
}

/// Probe a local server and list its installed models.
pub async fn check_ollama_connection(http: &reqwest::Client, base_url: &str) -> OllamaStatus {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));

    let response = match http
        .get(&url)
        .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return OllamaStatus {
                reachable: false,
                message: unreachable_guidance(base_url, &e),
                models: Vec::new(),
            }
        }
    };

    if !response.status().is_success() {
        return OllamaStatus {
            reachable: false,
            message: format!(
                "Ollama server at {} responded with status {}. Try restarting it with: ollama serve",
                base_url,
                response.status().as_u16()
            ),
            models: Vec::new(),
        };
    }

    let models = match response.json::<TagsResponse>().await {
        Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
        Err(_) => Vec::new(),
    };

    debug!("Ollama server reachable, {} models installed", models.len());

    OllamaStatus {
        reachable: true,
        message: format!("Connected to Ollama at {}", base_url),
        models,
    }
}

fn rewrite_chat_error(base_url: &str, model: &str, error: String) -> String {
    let lowered = error.to_lowercase();
    if lowered.contains("404") || lowered.contains("not found") {
        format!(
            "Model '{}' is not installed on the Ollama server at {}.\n\n\
             Install it with: ollama pull {}",
            model, base_url, model
        )
    } else if lowered.contains("400") {
        format!(
            "Ollama rejected the request for model '{}'. The input may exceed the model's \
             context window; try a smaller chunk size or a model with a larger context.",
            model
        )
    } else {
        format!("Ollama error: {}", error)
    }
}

/// One chat call against a local server's OpenAI-compatible endpoint.
pub(crate) async fn chat(
    http: &reqwest::Client,
    base_url: &str,
    model: &str,
    messages: &[Message],
) -> Result<BackendReply, String> {
    let status = check_ollama_connection(http, base_url).await;
    if !status.reachable {
        return Err(status.message);
    }

    let api_base = format!("{}/v1", base_url.trim_end_matches('/'));
    // The OpenAI-compatible endpoint requires a key header but ignores it.
    openai::chat("ollama", Some(&api_base), model, messages, "Ollama")
        .await
        .map_err(|e| rewrite_chat_error(base_url, model, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_guidance() {
        let message = rewrite_chat_error("http://localhost:11434", "llama3.2", "Ollama error: 404 Not Found".into());
        assert!(message.contains("ollama pull llama3.2"));
    }

    #[test]
    fn test_context_window_guidance() {
        let message = rewrite_chat_error("http://localhost:11434", "phi3", "400 Bad Request".into());
        assert!(message.contains("context window"));
    }

    #[tokio::test]
    async fn test_unreachable_server_returns_guidance() {
        let http = reqwest::Client::new();
        // Port 9 (discard) refuses connections on any sane host.
        let status = check_ollama_connection(&http, "http://127.0.0.1:9").await;
        assert!(!status.reachable);
        assert!(status.message.contains("ollama serve") || status.message.contains("Cannot connect"));
        assert!(status.models.is_empty());
    }

    #[tokio::test]
    async fn test_chat_against_unreachable_server_fails_cleanly() {
        let http = reqwest::Client::new();
        let result = chat(&http, "http://127.0.0.1:9", "llama3.2", &[Message::user("hi")]).await;
        assert!(result.is_err());
    }
}
