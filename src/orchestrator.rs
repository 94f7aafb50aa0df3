//! Document processing orchestration.
//!
//! Routes a prompt plus optional document and attachments through one of
//! four paths: general chat, attachments only, single chunk with full
//! conversation context, or chunked processing with a consolidation call.
//! All provider failures abort the whole operation; nothing partial is
//! recorded or returned.

use crate::chunking::{split_entries, ChunkSize};
use crate::config::Settings;
use crate::document::{build_attachment_text, render_entries, Attachment, Entry, TimestampInterval};
use crate::library::DocumentLibrary;
use crate::provider::{AiClient, CallOutcome, CallRequest, Message, Provider};
use crate::thread::ThreadStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// System prompt for per-chunk calls, which run without thread context.
const CHUNK_SYSTEM_PROMPT: &str = "You are a helpful AI assistant analyzing documents.";

/// System prompt for the consolidation call.
const CONSOLIDATION_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant consolidating information from multiple document sections.";

/// Keywords suggesting a prompt expects document content to exist.
const DOCUMENT_KEYWORDS: &[&str] = &[
    "document", "text", "article", "content", "passage", "summary", "summarize", "extract",
    "analyze", "review", "above", "provided", "following", "attached", "this file",
];

/// Whether a prompt looks like it refers to a loaded document. Callers can
/// use this to confirm with the user before processing a document-referential
/// prompt with nothing loaded; processing itself never blocks on it.
pub fn prompt_references_document(prompt: &str) -> bool {
    let prompt = prompt.to_lowercase();
    DOCUMENT_KEYWORDS.iter().any(|k| prompt.contains(k))
}

/// Run state of the single allowed in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Cancelling,
}

/// Mutual exclusion and cooperative cancellation for processing runs.
///
/// At most one operation runs at a time. Cancellation is checked once per
/// chunk iteration; an in-flight provider call is never interrupted.
#[derive(Debug, Default)]
pub struct Supervisor {
    state: Mutex<RunState>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Request cancellation of the running operation, if any.
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == RunState::Running {
            *state = RunState::Cancelling;
        }
    }

    fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == RunState::Idle {
            *state = RunState::Running;
            true
        } else {
            false
        }
    }

    fn is_cancelling(&self) -> bool {
        self.state() == RunState::Cancelling
    }

    fn finish(&self) {
        *self.state.lock().unwrap() = RunState::Idle;
    }
}

/// Receiver for user-visible progress messages.
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str);
}

/// Status sink that writes progress to the log.
#[derive(Debug, Default)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn status(&self, message: &str) {
        info!("{}", message);
    }
}

/// One processing request.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    /// Library id of the loaded document, if any.
    pub document_id: Option<String>,
    /// Entries of the loaded document; empty when no document is loaded.
    pub entries: Vec<Entry>,
    pub attachments: Vec<Attachment>,
    pub prompt: String,
    /// Named prompt for the cost log; "Custom Prompt" when absent.
    pub prompt_name: Option<String>,
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
}

/// Drives provider calls for one document/prompt at a time.
pub struct Orchestrator {
    client: Arc<dyn AiClient>,
    library: Arc<dyn DocumentLibrary>,
    thread: ThreadStore,
    status: Arc<dyn StatusSink>,
    supervisor: Arc<Supervisor>,
    chunk_size: ChunkSize,
    inter_chunk_delay: Duration,
    timestamp_interval: TimestampInterval,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn AiClient>, library: Arc<dyn DocumentLibrary>) -> Self {
        Self {
            client,
            thread: ThreadStore::new(library.clone()),
            library,
            status: Arc::new(LogStatus),
            supervisor: Arc::new(Supervisor::new()),
            chunk_size: ChunkSize::default(),
            inter_chunk_delay: Duration::from_secs(12),
            timestamp_interval: TimestampInterval::default(),
        }
    }

    /// Apply chunking configuration from settings.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.chunk_size = settings.chunking.size;
        self.inter_chunk_delay = Duration::from_secs(settings.chunking.inter_chunk_delay_seconds);
        self.timestamp_interval = settings.chunking.timestamp_interval;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    pub fn with_status_sink(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    /// Handle for cancelling a running operation from another task.
    pub fn supervisor(&self) -> Arc<Supervisor> {
        self.supervisor.clone()
    }

    pub fn thread(&self) -> &ThreadStore {
        &self.thread
    }

    /// Make a different document current, saving the active thread first.
    pub async fn switch_document(
        &mut self,
        document_id: Option<&str>,
        model: &str,
        provider: Provider,
    ) -> crate::error::Result<()> {
        self.thread.switch_document(document_id, model, provider).await
    }

    /// Process one prompt against the current document and attachments.
    ///
    /// Completion is signalled by the returned future; failures of any kind
    /// come back as an unsuccessful outcome, never an error.
    pub async fn process(&mut self, request: &ProcessRequest) -> CallOutcome {
        if !self.supervisor.begin() {
            return CallOutcome::failure("Processing already in progress");
        }
        let outcome = self.run(request).await;
        self.supervisor.finish();
        outcome
    }

    async fn run(&mut self, request: &ProcessRequest) -> CallOutcome {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return CallOutcome::failure("No prompt provided");
        }

        let attachment_text = if request.attachments.is_empty() {
            None
        } else {
            Some(build_attachment_text(&request.attachments))
        };

        if request.entries.is_empty() {
            return self.single_call_path(request, prompt, None, attachment_text.as_deref()).await;
        }

        let chunks = split_entries(&request.entries, self.chunk_size);
        if chunks.len() == 1 {
            let document_text = render_entries(&chunks[0], self.timestamp_interval);
            return self
                .single_call_path(request, prompt, Some(&document_text), attachment_text.as_deref())
                .await;
        }

        self.multi_chunk_path(request, prompt, &chunks, attachment_text.as_deref()).await
    }

    async fn document_title(&self, request: &ProcessRequest) -> String {
        if request.entries.is_empty() && !request.attachments.is_empty() {
            return "Attachments Only".to_string();
        }
        match &request.document_id {
            Some(id) => self
                .library
                .document_title(id)
                .await
                .unwrap_or_else(|| "Unknown Document".to_string()),
            None => "Unknown Document".to_string(),
        }
    }

    fn prompt_name(request: &ProcessRequest) -> String {
        request
            .prompt_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Custom Prompt".to_string())
    }

    /// Record a successful exchange and save the thread. A failed save is
    /// logged but never turns a successful call into a failure.
    async fn record_and_persist(
        &mut self,
        request: &ProcessRequest,
        prompt: &str,
        reply: &str,
        document_sent: bool,
    ) {
        self.thread.record_exchange(prompt, reply, document_sent);
        if let Err(e) = self.thread.persist(&request.model, request.provider).await {
            warn!("Failed to save conversation thread: {}", e);
        }
    }

    /// General chat, attachments-only and single-chunk processing: one call
    /// with full conversation context.
    async fn single_call_path(
        &mut self,
        request: &ProcessRequest,
        prompt: &str,
        document_text: Option<&str>,
        attachment_text: Option<&str>,
    ) -> CallOutcome {
        let document_sent = self.thread.will_embed_document(document_text.is_some());
        let messages = self.thread.build_messages(prompt, document_text, attachment_text);

        match (document_text.is_some(), request.attachments.len()) {
            (false, 0) => self.status.status("Processing general query..."),
            (false, n) => self.status.status(&format!("Processing {} attachments...", n)),
            (true, 0) => self.status.status("Processing with conversation context..."),
            (true, n) => self.status.status(&format!("Processing document + {} attachments...", n)),
        }

        let outcome = self
            .client
            .call(&CallRequest {
                provider: request.provider,
                model: request.model.clone(),
                messages,
                api_key: request.api_key.clone(),
                document_title: Some(self.document_title(request).await),
                prompt_name: Some(Self::prompt_name(request)),
            })
            .await;

        if outcome.success {
            self.record_and_persist(request, prompt, &outcome.text, document_sent).await;
        }
        outcome
    }

    /// Chunked processing: each chunk is analyzed with a fresh minimal
    /// message pair, then a consolidation call merges the section results.
    /// Only the consolidated exchange enters the conversation thread.
    async fn multi_chunk_path(
        &mut self,
        request: &ProcessRequest,
        prompt: &str,
        chunks: &[Vec<Entry>],
        attachment_text: Option<&str>,
    ) -> CallOutcome {
        let title = self.document_title(request).await;
        let prompt_name = Self::prompt_name(request);
        let total = chunks.len();
        let mut results = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            if self.supervisor.is_cancelling() {
                return CallOutcome::failure("Processing cancelled");
            }

            let number = index + 1;
            let chunk_text = render_entries(chunk, self.timestamp_interval);
            self.status.status(&format!("Processing chunk {}/{}...", number, total));

            let outcome = self
                .client
                .call(&CallRequest {
                    provider: request.provider,
                    model: request.model.clone(),
                    messages: vec![
                        Message::system(CHUNK_SYSTEM_PROMPT),
                        Message::user(format!("{}\n\n{}", prompt, chunk_text)),
                    ],
                    api_key: request.api_key.clone(),
                    document_title: Some(format!("{} (Chunk {}/{})", title, number, total)),
                    prompt_name: Some(format!("{} - Chunk {}", prompt_name, number)),
                })
                .await;

            if !outcome.success {
                return outcome;
            }
            results.push(outcome.text);

            // Pause between chunk calls only; not before the first chunk and
            // not around the consolidation call.
            if number < total {
                self.status.status(&format!(
                    "Waiting {}s before next chunk to avoid rate limits...",
                    self.inter_chunk_delay.as_secs()
                ));
                if !self.inter_chunk_delay.is_zero() {
                    tokio::time::sleep(self.inter_chunk_delay).await;
                }
            }
        }

        let combined = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("Section {}:\n{}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let mut consolidation_prompt = format!(
            "{}\n\nHere are the key points extracted from each section of the document:\n\n{}",
            prompt, combined
        );
        if let Some(attachments) = attachment_text {
            consolidation_prompt.push_str("\n\n");
            consolidation_prompt.push_str(attachments);
        }

        self.status.status("Consolidating results...");

        let outcome = self
            .client
            .call(&CallRequest {
                provider: request.provider,
                model: request.model.clone(),
                messages: vec![
                    Message::system(CONSOLIDATION_SYSTEM_PROMPT),
                    Message::user(consolidation_prompt),
                ],
                api_key: request.api_key.clone(),
                document_title: Some(format!("{} (Consolidation)", title)),
                prompt_name: Some(format!("{} - Final", prompt_name)),
            })
            .await;

        // Chunk calls and the consolidation never embed the document, so a
        // pending refresh stays due for the next threaded turn.
        if outcome.success {
            self.record_and_persist(request, prompt, &outcome.text, false).await;
        }
        outcome
    }
}
