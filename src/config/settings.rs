//! Configuration settings for Granska.

use crate::chunking::ChunkSize;
use crate::document::TimestampInterval;
use crate::provider::{Provider, OLLAMA_DEFAULT_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub ai: AiSettings,
    pub chunking: ChunkingSettings,
    pub ollama: OllamaSettings,
    pub cost: CostSettings,
}


/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.granska".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// AI provider and model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Active provider.
    pub provider: Provider,
    /// Model name for the active provider.
    pub model: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Document chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Chunk size tier (tiny, small, medium, large).
    pub size: ChunkSize,
    /// Pause between chunk calls, for provider rate limits.
    pub inter_chunk_delay_seconds: u64,
    /// How often timestamps appear in rendered document text.
    pub timestamp_interval: TimestampInterval,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            size: ChunkSize::Medium,
            inter_chunk_delay_seconds: 12,
            timestamp_interval: TimestampInterval::EverySegment,
        }
    }
}

/// Local Ollama server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    /// Base URL of the local server.
    pub base_url: String,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            base_url: OLLAMA_DEFAULT_URL.to_string(),
        }
    }
}

/// Cost logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    /// Path of the append-only cost log.
    pub log_path: String,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            log_path: "~/.granska/api_costs.txt".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::GranskaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("granska")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded cost log path.
    pub fn cost_log_path(&self) -> PathBuf {
        Self::expand_path(&self.cost.log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.ai.provider, Provider::OpenAi);
        assert_eq!(settings.chunking.size, ChunkSize::Medium);
        assert_eq!(settings.chunking.inter_chunk_delay_seconds, 12);
        assert_eq!(settings.ollama.base_url, OLLAMA_DEFAULT_URL);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [ai]
            provider = "anthropic"
            model = "claude-3-5-sonnet-latest"

            [chunking]
            size = "large"
            "#,
        )
        .unwrap();
        assert_eq!(settings.ai.provider, Provider::Anthropic);
        assert_eq!(settings.chunking.size, ChunkSize::Large);
        assert_eq!(settings.chunking.inter_chunk_delay_seconds, 12);
        assert_eq!(settings.general.log_level, "info");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "ai = \"not a table\"").unwrap();
        let error = Settings::load_from(Some(&path)).unwrap_err();
        assert!(matches!(error, crate::error::GranskaError::TomlParse(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.ai.model = "gpt-4o".to_string();
        settings.chunking.inter_chunk_delay_seconds = 3;
        settings.save_to(&path).unwrap();

        let reloaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(reloaded.ai.model, "gpt-4o");
        assert_eq!(reloaded.chunking.inter_chunk_delay_seconds, 3);
    }
}
