//! Document library storage abstraction.
//!
//! The library owns documents and the conversation thread saved against each
//! one. Persistence is behind a trait so the pipeline can run against any
//! backing store.

mod memory;

pub use memory::MemoryLibrary;

use crate::error::Result;
use crate::provider::{Message, Provider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside a saved conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMetadata {
    pub model: String,
    pub provider: Provider,
    pub last_updated: DateTime<Utc>,
    /// Number of user turns in the saved thread.
    pub message_count: usize,
}

/// A conversation thread saved against a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedThread {
    pub messages: Vec<Message>,
    pub metadata: ThreadMetadata,
}

/// Storage for documents and their saved conversation threads.
#[async_trait]
pub trait DocumentLibrary: Send + Sync {
    /// Save (overwrite) the thread for a document, verbatim.
    async fn save_thread(
        &self,
        document_id: &str,
        messages: &[Message],
        metadata: ThreadMetadata,
    ) -> Result<()>;

    /// Load the saved thread for a document, if one exists.
    async fn load_thread(&self, document_id: &str) -> Result<Option<SavedThread>>;

    /// Display title of a document, if known.
    async fn document_title(&self, document_id: &str) -> Option<String>;
}
