//! Conversation thread store.
//!
//! One thread is active at a time, tied to the currently loaded document.
//! Switching documents saves the active thread verbatim before clearing it;
//! a thread previously saved against the incoming document is restored, and
//! the next user turn re-embeds the document text since the model no longer
//! has it in context.

use crate::error::Result;
use crate::library::{DocumentLibrary, ThreadMetadata};
use crate::provider::{Message, Provider, Role};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// System prompt for threaded conversation calls.
pub const THREAD_SYSTEM_PROMPT: &str = "You are a helpful AI assistant analyzing documents. \
     Maintain context from previous messages in this conversation.";

/// Conversation thread for the currently loaded document.
///
/// The thread records bare prompts and replies; the document text is sent
/// inline only on the first turn (or after a restore) and is not repeated in
/// the recorded history.
pub struct ThreadStore {
    library: Arc<dyn DocumentLibrary>,
    messages: Vec<Message>,
    document_id: Option<String>,
    needs_document_refresh: bool,
}

impl ThreadStore {
    pub fn new(library: Arc<dyn DocumentLibrary>) -> Self {
        Self {
            library,
            messages: Vec::new(),
            document_id: None,
            needs_document_refresh: false,
        }
    }

    /// User/assistant turns of the active thread, in order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of user turns, as shown in thread status.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Whether the next user turn must re-embed the document text.
    pub fn needs_document_refresh(&self) -> bool {
        self.needs_document_refresh
    }

    /// Whether [`build_messages`](Self::build_messages) would embed the
    /// document text in the next user turn.
    pub fn will_embed_document(&self, has_document: bool) -> bool {
        has_document && (self.messages.is_empty() || self.needs_document_refresh)
    }

    /// Drop the active thread without saving.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.needs_document_refresh = false;
    }

    /// Save the active thread against its document, verbatim. A later save
    /// overwrites; saved threads are never merged.
    pub async fn persist(&self, model: &str, provider: Provider) -> Result<()> {
        let Some(document_id) = self.document_id.as_deref() else {
            return Ok(());
        };
        if self.messages.is_empty() {
            return Ok(());
        }
        let metadata = ThreadMetadata {
            model: model.to_string(),
            provider,
            last_updated: Utc::now(),
            message_count: self.user_message_count(),
        };
        self.library.save_thread(document_id, &self.messages, metadata).await
    }

    /// Make a different document (or no document) current.
    ///
    /// The active thread is persisted before anything is cleared, so a failed
    /// save leaves the thread intact. If the incoming document has a saved
    /// thread it becomes the active one, flagged for document refresh.
    pub async fn switch_document(
        &mut self,
        new_document_id: Option<&str>,
        model: &str,
        provider: Provider,
    ) -> Result<()> {
        if self.document_id.as_deref() == new_document_id {
            return Ok(());
        }

        self.persist(model, provider).await?;
        self.clear();
        self.document_id = new_document_id.map(String::from);

        if let Some(document_id) = new_document_id {
            if let Some(saved) = self.library.load_thread(document_id).await? {
                info!(
                    "Restored thread with {} messages for document {}",
                    saved.messages.len(),
                    document_id
                );
                self.messages = saved.messages;
                self.needs_document_refresh = !self.messages.is_empty();
            }
        }
        Ok(())
    }

    /// Compose the wire messages for one threaded call: system turn, recorded
    /// history, then the new user turn.
    ///
    /// The document text goes into the user turn only on the first turn of a
    /// thread, or once after a saved thread was restored (the model's context
    /// from the earlier session is gone). Attachment text is appended to the
    /// current user turn.
    pub fn build_messages(
        &self,
        prompt: &str,
        document_text: Option<&str>,
        attachment_text: Option<&str>,
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(THREAD_SYSTEM_PROMPT)];

        let document_text = document_text.filter(|t| !t.trim().is_empty());

        let mut content = if self.messages.is_empty() {
            match document_text {
                Some(text) => format!("{}\n\n--- DOCUMENT ---\n{}", prompt, text),
                None => prompt.to_string(),
            }
        } else if let (true, Some(text)) = (self.needs_document_refresh, document_text) {
            debug!("Re-including document context for resumed conversation");
            format!("{}\n\n--- DOCUMENT (for context) ---\n{}", prompt, text)
        } else {
            prompt.to_string()
        };

        if let Some(attachments) = attachment_text.filter(|t| !t.is_empty()) {
            content.push_str("\n\n");
            content.push_str(attachments);
        }

        messages.extend(self.messages.iter().cloned());
        messages.push(Message::user(content));

        messages
    }

    /// Append one turn to the thread.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message { role, content: content.into() });
    }

    /// Record a completed exchange. Only the bare prompt is stored; document
    /// and attachment text sent on the wire are not repeated in history.
    ///
    /// `document_sent` marks an exchange whose user turn embedded the
    /// document text, satisfying a pending refresh. Exchanges that never
    /// carry the document (chunked runs, general chat) leave the flag set so
    /// the next document-bearing turn still re-embeds it.
    pub fn record_exchange(&mut self, prompt: &str, assistant_reply: &str, document_sent: bool) {
        self.add_message(Role::User, prompt);
        self.add_message(Role::Assistant, assistant_reply);
        if document_sent {
            self.needs_document_refresh = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::MemoryLibrary;

    fn store() -> (ThreadStore, Arc<MemoryLibrary>) {
        let library = Arc::new(MemoryLibrary::new());
        (ThreadStore::new(library.clone()), library)
    }

    #[tokio::test]
    async fn test_first_turn_embeds_document() {
        let (mut thread, _) = store();
        thread.switch_document(Some("doc-1"), "m", Provider::OpenAi).await.unwrap();

        let messages = thread.build_messages("Summarize this", Some("BODY"), None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("--- DOCUMENT ---\nBODY"));
    }

    #[tokio::test]
    async fn test_followup_turn_omits_document() {
        let (mut thread, _) = store();
        thread.switch_document(Some("doc-1"), "m", Provider::OpenAi).await.unwrap();

        thread.record_exchange("Summarize this", "Summary.", true);

        let messages = thread.build_messages("Shorter please", Some("BODY"), None);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[3].content, "Shorter please");
        assert!(!messages[3].content.contains("--- DOCUMENT"));
    }

    #[tokio::test]
    async fn test_attachments_appended_to_user_turn() {
        let (mut thread, _) = store();
        thread.switch_document(Some("doc-1"), "m", Provider::OpenAi).await.unwrap();

        let messages = thread.build_messages("Compare", None, Some("ATTACHED DOCUMENTS"));
        let user_turn = &messages.last().unwrap().content;
        assert!(user_turn.starts_with("Compare\n\n"));
        assert!(user_turn.ends_with("ATTACHED DOCUMENTS"));
    }

    #[tokio::test]
    async fn test_switch_saves_thread_verbatim_before_clearing() {
        let (mut thread, library) = store();
        library.add_document("doc-a", "A").await;
        thread.switch_document(Some("doc-a"), "gpt-4o-mini", Provider::OpenAi).await.unwrap();

        thread.record_exchange("Summarize", "Summary of A", true);

        thread.switch_document(Some("doc-b"), "gpt-4o-mini", Provider::OpenAi).await.unwrap();
        assert!(thread.is_empty());

        let saved = library.load_thread("doc-a").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].content, "Summarize");
        assert_eq!(saved.messages[1].content, "Summary of A");
        assert_eq!(saved.metadata.message_count, 1);
    }

    #[tokio::test]
    async fn test_restored_thread_refreshes_document_once() {
        let (mut thread, library) = store();
        library.add_document("doc-a", "A").await;

        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.record_exchange("Summarize", "Summary", true);
        thread.switch_document(None, "m", Provider::OpenAi).await.unwrap();

        // Coming back restores the saved thread and flags a refresh.
        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        assert_eq!(thread.messages().len(), 2);
        assert!(thread.needs_document_refresh());

        let messages = thread.build_messages("And now?", Some("TEXT A"), None);
        assert!(messages.last().unwrap().content.contains("--- DOCUMENT (for context) ---"));

        thread.record_exchange("And now?", "More", true);
        assert!(!thread.needs_document_refresh());
        let messages = thread.build_messages("Again?", Some("TEXT A"), None);
        assert!(!messages.last().unwrap().content.contains("--- DOCUMENT"));
    }

    #[tokio::test]
    async fn test_refresh_flag_survives_exchange_without_document() {
        let (mut thread, library) = store();
        library.add_document("doc-a", "A").await;

        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.record_exchange("Summarize", "Summary", true);
        thread.switch_document(None, "m", Provider::OpenAi).await.unwrap();
        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        assert!(thread.needs_document_refresh());

        // An exchange that never carried the document leaves the refresh due.
        thread.record_exchange("Consolidated ask", "Consolidated reply", false);
        assert!(thread.needs_document_refresh());

        let messages = thread.build_messages("Follow up", Some("TEXT A"), None);
        assert!(messages.last().unwrap().content.contains("--- DOCUMENT (for context) ---"));
    }

    #[tokio::test]
    async fn test_switch_to_same_document_keeps_thread() {
        let (mut thread, _) = store();
        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.record_exchange("Hi", "Hello", false);

        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        assert_eq!(thread.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_saved_threads_overwrite_not_merge() {
        let (mut thread, library) = store();
        library.add_document("doc-a", "A").await;

        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.record_exchange("One", "R1", true);
        thread.switch_document(None, "m", Provider::OpenAi).await.unwrap();

        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.record_exchange("Two", "R2", true);
        thread.switch_document(None, "m", Provider::OpenAi).await.unwrap();

        // Second save is the restored thread extended by one exchange, not a
        // merge of independent copies.
        let saved = library.load_thread("doc-a").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 4);
        assert_eq!(saved.metadata.message_count, 2);
    }

    #[tokio::test]
    async fn test_empty_thread_is_not_persisted() {
        let (mut thread, library) = store();
        library.add_document("doc-a", "A").await;
        thread.switch_document(Some("doc-a"), "m", Provider::OpenAi).await.unwrap();
        thread.switch_document(None, "m", Provider::OpenAi).await.unwrap();
        assert!(library.load_thread("doc-a").await.unwrap().is_none());
    }
}
