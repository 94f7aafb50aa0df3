//! Document entries, text rendering, and attachment formatting.
//!
//! The document library owns documents; this module only defines the entry
//! shape the core consumes and the flattened-text projection it sends to AI
//! providers.

use serde::{Deserialize, Serialize};

/// One span of source text with optional location metadata.
///
/// Entries come from heterogeneous extractors: audio transcripts carry
/// `start` timestamps (and sometimes a `speaker`), OCR output carries a
/// `location` like "Page 3", plain text carries neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Text content of this entry.
    pub text: String,
    /// Start time in seconds, for timestamped sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    /// Pre-formatted location label ("Page 3", "12:05").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Speaker label for diarized audio transcriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Entry {
    /// Create a plain text entry with no location metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            location: None,
            speaker: None,
        }
    }

    /// Create a timestamped entry.
    pub fn timestamped(text: impl Into<String>, start: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            location: None,
            speaker: None,
        }
    }
}

/// How often timestamps appear in rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampInterval {
    /// Show a timestamp for every segment.
    #[default]
    EverySegment,
    /// At most one timestamp per minute.
    OneMinute,
    /// At most one timestamp per five minutes.
    FiveMinutes,
    /// At most one timestamp per ten minutes.
    TenMinutes,
    /// No timestamps at all.
    Never,
}

impl TimestampInterval {
    fn seconds(self) -> f64 {
        match self {
            TimestampInterval::EverySegment => 0.0,
            TimestampInterval::OneMinute => 60.0,
            TimestampInterval::FiveMinutes => 300.0,
            TimestampInterval::TenMinutes => 600.0,
            TimestampInterval::Never => f64::INFINITY,
        }
    }
}

impl std::str::FromStr for TimestampInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "every_segment" => Ok(TimestampInterval::EverySegment),
            "1min" => Ok(TimestampInterval::OneMinute),
            "5min" => Ok(TimestampInterval::FiveMinutes),
            "10min" => Ok(TimestampInterval::TenMinutes),
            "never" => Ok(TimestampInterval::Never),
            _ => Err(format!("Unknown timestamp interval: {}", s)),
        }
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Render entries to the flattened text sent to AI providers.
///
/// Page-located entries (location starting with "Page") show their location
/// once per page change. Timestamped entries show timestamps at most once per
/// interval. Speaker changes emit a `**Name:**` header line.
pub fn render_entries(entries: &[Entry], interval: TimestampInterval) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let interval_secs = interval.seconds();
    let mut lines: Vec<String> = Vec::new();
    let mut last_timestamp = -interval_secs;
    let mut last_page: Option<&str> = None;
    let mut last_speaker: Option<&str> = None;

    for entry in entries {
        let text = entry.text.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(speaker) = entry.speaker.as_deref() {
            if last_speaker != Some(speaker) {
                lines.push(format!("**{}:**", speaker));
                last_speaker = Some(speaker);
            }
        }

        let is_page_entry = entry
            .location
            .as_deref()
            .is_some_and(|l| l.starts_with("Page"));

        if is_page_entry {
            let location = entry.location.as_deref().unwrap_or_default();
            if last_page != Some(location) {
                lines.push(format!("[{}] {}", location, text));
                last_page = Some(location);
            } else {
                lines.push(text.to_string());
            }
        } else if let Some(start) = entry.start {
            let show = matches!(interval, TimestampInterval::EverySegment)
                || (start - last_timestamp) >= interval_secs;
            if show && !matches!(interval, TimestampInterval::Never) {
                let label = entry
                    .location
                    .clone()
                    .unwrap_or_else(|| format_timestamp(start));
                lines.push(format!("[{}] {}", label, text));
                last_timestamp = start;
            } else {
                lines.push(text.to_string());
            }
        } else {
            lines.push(text.to_string());
        }
    }

    lines.join("\n\n")
}

/// An attached document supplied alongside the main document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename.
    pub filename: String,
    /// Extracted text content.
    pub text: String,
    /// Approximate word count (for context-size warnings upstream).
    pub word_count: usize,
}

impl Attachment {
    /// Create an attachment, deriving the word count from the text.
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            filename: filename.into(),
            text,
            word_count,
        }
    }
}

/// Build the delimited attachment block merged into a user turn.
///
/// Returns an empty string when there are no attachments.
pub fn build_attachment_text(attachments: &[Attachment]) -> String {
    if attachments.is_empty() {
        return String::new();
    }

    let bar = "=".repeat(60);
    let mut parts = vec![bar.clone(), "ATTACHED DOCUMENTS".to_string(), bar.clone()];

    for (i, att) in attachments.iter().enumerate() {
        parts.push(format!("\n--- ATTACHMENT {}: {} ---", i + 1, att.filename));
        parts.push(format!("(~{} words)", att.word_count));
        parts.push(String::new());
        parts.push(att.text.clone());
        parts.push(String::new());
    }

    parts.push(bar.clone());
    parts.push("END OF ATTACHMENTS".to_string());
    parts.push(bar);

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_entries() {
        let entries = vec![Entry::text("First paragraph."), Entry::text("Second.")];
        let text = render_entries(&entries, TimestampInterval::EverySegment);
        assert_eq!(text, "First paragraph.\n\nSecond.");
    }

    #[test]
    fn test_render_timestamps_every_segment() {
        let entries = vec![
            Entry::timestamped("Hello", 0.0),
            Entry::timestamped("world", 65.0),
        ];
        let text = render_entries(&entries, TimestampInterval::EverySegment);
        assert_eq!(text, "[00:00] Hello\n\n[01:05] world");
    }

    #[test]
    fn test_render_timestamps_interval() {
        let entries = vec![
            Entry::timestamped("a", 0.0),
            Entry::timestamped("b", 30.0),
            Entry::timestamped("c", 61.0),
        ];
        let text = render_entries(&entries, TimestampInterval::OneMinute);
        assert_eq!(text, "[00:00] a\n\nb\n\n[01:01] c");
    }

    #[test]
    fn test_render_never_shows_timestamps() {
        let entries = vec![Entry::timestamped("a", 0.0), Entry::timestamped("b", 600.0)];
        let text = render_entries(&entries, TimestampInterval::Never);
        assert_eq!(text, "a\n\nb");
    }

    #[test]
    fn test_render_page_locations_once_per_page() {
        let mut e1 = Entry::text("line one");
        e1.start = Some(1.0);
        e1.location = Some("Page 1".to_string());
        let mut e2 = Entry::text("line two");
        e2.start = Some(1.0);
        e2.location = Some("Page 1".to_string());
        let mut e3 = Entry::text("line three");
        e3.start = Some(2.0);
        e3.location = Some("Page 2".to_string());

        let text = render_entries(&[e1, e2, e3], TimestampInterval::EverySegment);
        assert_eq!(
            text,
            "[Page 1] line one\n\nline two\n\n[Page 2] line three"
        );
    }

    #[test]
    fn test_render_speaker_headers() {
        let mut e1 = Entry::text("Hi there.");
        e1.speaker = Some("Alice".to_string());
        let mut e2 = Entry::text("Still me.");
        e2.speaker = Some("Alice".to_string());
        let mut e3 = Entry::text("Hello back.");
        e3.speaker = Some("Bob".to_string());

        let text = render_entries(&[e1, e2, e3], TimestampInterval::Never);
        assert!(text.starts_with("**Alice:**"));
        assert!(text.contains("**Bob:**"));
        // Alice's header appears once for her two consecutive entries.
        assert_eq!(text.matches("**Alice:**").count(), 1);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(65.0), "01:05");
        assert_eq!(format_timestamp(3661.0), "01:01:01");
    }

    #[test]
    fn test_attachment_block() {
        let atts = vec![
            Attachment::new("notes.txt", "some words here"),
            Attachment::new("report.pdf", "more text"),
        ];
        let block = build_attachment_text(&atts);
        assert!(block.contains("ATTACHED DOCUMENTS"));
        assert!(block.contains("--- ATTACHMENT 1: notes.txt ---"));
        assert!(block.contains("(~3 words)"));
        assert!(block.contains("--- ATTACHMENT 2: report.pdf ---"));
        assert!(block.ends_with(&"=".repeat(60)));
    }

    #[test]
    fn test_no_attachments_empty_block() {
        assert_eq!(build_attachment_text(&[]), "");
    }
}
