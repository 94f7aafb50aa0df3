//! Configuration management.

mod settings;

pub use settings::{
    AiSettings, ChunkingSettings, CostSettings, GeneralSettings, OllamaSettings, Settings,
};
