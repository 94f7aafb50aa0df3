//! Document chunking for bounded-size AI calls.
//!
//! Splits a document's ordered entries into groups whose rendered text stays
//! under a size tier's character budget, so long documents can be processed
//! as a sequence of per-chunk calls plus one consolidation call.

use crate::document::Entry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Chunk size tier.
///
/// Tiers trade extraction quality against call count: smaller chunks give the
/// model more room per section, larger chunks finish faster. `Tiny` exists
/// for local models with 4K-token context windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSize {
    /// ~3-6 pages, for local AI models with small context windows.
    Tiny,
    /// ~6-12 pages, best detail extraction.
    Small,
    /// ~10-15 pages, balanced.
    #[default]
    Medium,
    /// ~20+ pages, fastest.
    Large,
}

impl ChunkSize {
    /// Maximum rendered characters per chunk for this tier.
    pub fn max_chars(self) -> usize {
        match self {
            ChunkSize::Tiny => 6_000,
            ChunkSize::Small => 12_000,
            ChunkSize::Medium => 24_000,
            ChunkSize::Large => 52_000,
        }
    }
}

impl std::str::FromStr for ChunkSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ChunkSize::Tiny),
            "small" => Ok(ChunkSize::Small),
            "medium" => Ok(ChunkSize::Medium),
            "large" => Ok(ChunkSize::Large),
            _ => Err(format!("Unknown chunk size: {}", s)),
        }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkSize::Tiny => write!(f, "tiny"),
            ChunkSize::Small => write!(f, "small"),
            ChunkSize::Medium => write!(f, "medium"),
            ChunkSize::Large => write!(f, "large"),
        }
    }
}

/// Upper bound on an entry's contribution to the rendered chunk text: the
/// text itself, the joining blank line, and any timestamp/page label or
/// speaker header the renderer may add.
fn budgeted_len(entry: &Entry) -> usize {
    let mut len = entry.text.len() + 2;
    if let Some(location) = &entry.location {
        // "[{location}] "
        len += location.len() + 3;
    } else if entry.start.is_some() {
        len += "[00:00:00] ".len();
    }
    if let Some(speaker) = &entry.speaker {
        // "**{speaker}:**" on its own line
        len += speaker.len() + 7;
    }
    len
}

/// Split entries into ordered chunks whose rendered text stays under the
/// tier's character budget.
///
/// Entries are never split mid-entry: a single entry larger than the budget
/// becomes its own oversized chunk. Concatenating the returned chunks in
/// order reproduces the input exactly. An empty document yields one empty
/// chunk.
pub fn split_entries(entries: &[Entry], size: ChunkSize) -> Vec<Vec<Entry>> {
    let max_chars = size.max_chars();

    let mut chunks: Vec<Vec<Entry>> = Vec::new();
    let mut current: Vec<Entry> = Vec::new();
    let mut current_len = 0usize;

    for entry in entries {
        let entry_len = budgeted_len(entry);

        if entry_len > max_chars {
            warn!(
                entry_chars = entry_len,
                budget = max_chars,
                "entry exceeds the {} chunk budget; sending it as one oversized chunk",
                size
            );
        }

        if current_len + entry_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        current.push(entry.clone());
        current_len += entry_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        chunks.push(Vec::new());
    }

    chunks
}
