//! In-memory document library.

use super::{DocumentLibrary, SavedThread, ThreadMetadata};
use crate::error::Result;
use crate::provider::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct DocumentRecord {
    title: String,
    saved_thread: Option<SavedThread>,
}

/// Library keeping documents and saved threads in process memory.
#[derive(Default)]
pub struct MemoryLibrary {
    documents: Mutex<HashMap<String, DocumentRecord>>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document so threads can be saved against it.
    pub async fn add_document(&self, document_id: impl Into<String>, title: impl Into<String>) {
        let mut documents = self.documents.lock().await;
        documents.insert(
            document_id.into(),
            DocumentRecord {
                title: title.into(),
                saved_thread: None,
            },
        );
    }
}

#[async_trait]
impl DocumentLibrary for MemoryLibrary {
    async fn save_thread(
        &self,
        document_id: &str,
        messages: &[Message],
        metadata: ThreadMetadata,
    ) -> Result<()> {
        let mut documents = self.documents.lock().await;
        let record = documents.entry(document_id.to_string()).or_default();
        debug!(
            "Saving thread with {} messages to document {}",
            messages.len(),
            document_id
        );
        record.saved_thread = Some(SavedThread {
            messages: messages.to_vec(),
            metadata,
        });
        Ok(())
    }

    async fn load_thread(&self, document_id: &str) -> Result<Option<SavedThread>> {
        let documents = self.documents.lock().await;
        Ok(documents
            .get(document_id)
            .and_then(|record| record.saved_thread.clone()))
    }

    async fn document_title(&self, document_id: &str) -> Option<String> {
        let documents = self.documents.lock().await;
        documents.get(document_id).map(|record| record.title.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use chrono::Utc;

    fn metadata(count: usize) -> ThreadMetadata {
        ThreadMetadata {
            model: "gpt-4o-mini".to_string(),
            provider: Provider::OpenAi,
            last_updated: Utc::now(),
            message_count: count,
        }
    }

    #[tokio::test]
    async fn test_save_and_load_thread() {
        let library = MemoryLibrary::new();
        library.add_document("doc-1", "Quarterly Report").await;

        let messages = vec![Message::system("s"), Message::user("u"), Message::assistant("a")];
        library.save_thread("doc-1", &messages, metadata(1)).await.unwrap();

        let saved = library.load_thread("doc-1").await.unwrap().unwrap();
        assert_eq!(saved.messages, messages);
        assert_eq!(saved.metadata.message_count, 1);
        assert_eq!(
            library.document_title("doc-1").await.as_deref(),
            Some("Quarterly Report")
        );
    }

    #[tokio::test]
    async fn test_load_missing_thread() {
        let library = MemoryLibrary::new();
        assert!(library.load_thread("nope").await.unwrap().is_none());
        assert!(library.document_title("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_thread() {
        let library = MemoryLibrary::new();
        library.add_document("doc-1", "Notes").await;

        library
            .save_thread("doc-1", &[Message::user("first")], metadata(1))
            .await
            .unwrap();
        library
            .save_thread("doc-1", &[Message::user("second"), Message::assistant("r")], metadata(1))
            .await
            .unwrap();

        let saved = library.load_thread("doc-1").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].content, "second");
    }
}
