//! Export encoding and delivery
//!
//! Serializes everything the aggregator holds into one document, grouped by
//! conversation in first-seen order, and hands it to an [`ExportSink`].

use chrono::NaiveDateTime;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::config::{ExportConfig, ExportFormat};
use crate::error::ExportError;
use crate::record::{split_sender, ConversationId, MessageRecord};

const SEPARATOR_WIDTH: usize = 40;

/// A finished export: suggested filename plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub filename: String,
    pub payload: String,
}

/// What the user is told after an export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Delivered {
        filename: String,
        conversations: usize,
        records: usize,
    },
    NothingToExport,
    Failed {
        reason: String,
    },
}

impl ExportOutcome {
    /// One-line notice for the user.
    pub fn notice(&self) -> String {
        match self {
            ExportOutcome::Delivered {
                filename,
                conversations,
                records,
            } => format!(
                "Exported {} messages from {} conversations to {}",
                records, conversations, filename
            ),
            ExportOutcome::NothingToExport => "No messages captured yet, nothing to export".to_string(),
            ExportOutcome::Failed { reason } => format!("Export failed: {}", reason),
        }
    }
}

/// Receives finished export documents.
pub trait ExportSink {
    fn deliver(&mut self, document: &ExportDocument) -> Result<(), ExportError>;
}

/// Writes each document into a directory, creating it when missing.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for FileSink {
    fn deliver(&mut self, document: &ExportDocument) -> Result<(), ExportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&document.filename);
        std::fs::write(&path, document.payload.as_bytes())?;
        info!(path = %path.display(), "export written");
        Ok(())
    }
}

/// Prints each document to standard output.
pub struct StdoutSink;

impl ExportSink for StdoutSink {
    fn deliver(&mut self, document: &ExportDocument) -> Result<(), ExportError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "# {}", document.filename)?;
        stdout.write_all(document.payload.as_bytes())?;
        writeln!(stdout)?;
        Ok(())
    }
}

/// Encode, name and deliver the aggregator's contents.
pub fn export<S: ExportSink + ?Sized>(
    aggregator: &Aggregator,
    sink: &mut S,
    config: &ExportConfig,
    now: NaiveDateTime,
) -> ExportOutcome {
    let document = match build_document(aggregator, config, now) {
        Ok(Some(document)) => document,
        Ok(None) => {
            info!("export requested with no captured messages");
            return ExportOutcome::NothingToExport;
        }
        Err(err) => {
            warn!(%err, "export encoding failed");
            return ExportOutcome::Failed {
                reason: err.to_string(),
            };
        }
    };

    match sink.deliver(&document) {
        Ok(()) => ExportOutcome::Delivered {
            filename: document.filename,
            conversations: aggregator.conversation_count(),
            records: aggregator.record_count(),
        },
        Err(err) => {
            warn!(filename = %document.filename, %err, "export delivery failed");
            ExportOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}

/// Build the export document, or `None` when nothing was captured.
pub fn build_document(
    aggregator: &Aggregator,
    config: &ExportConfig,
    now: NaiveDateTime,
) -> Result<Option<ExportDocument>, ExportError> {
    if aggregator.is_empty() {
        return Ok(None);
    }

    let payload = match config.format {
        ExportFormat::Text => encode_text(aggregator),
        ExportFormat::Json => encode_json(aggregator)?,
    };

    Ok(Some(ExportDocument {
        filename: export_filename(&config.filename_prefix, config.format, now),
        payload,
    }))
}

pub fn encode_text(aggregator: &Aggregator) -> String {
    aggregator
        .snapshot()
        .filter(|(_, records)| !records.is_empty())
        .map(|(identity, records)| {
            let mut section = format!("=== {} ===\n", identity);
            for record in records {
                render_entry(&mut section, record);
            }
            section
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_entry(out: &mut String, record: &MessageRecord) {
    let label = match record.sender {
        Some(_) => split_sender(&record.raw_timestamp_label).0,
        None => record.raw_timestamp_label.trim(),
    };
    out.push_str(&format!("Time: {}\n", label));
    if let Some(sender) = &record.sender {
        out.push_str(&format!("From: {}\n", sender));
    }
    if let Some(lines) = &record.text {
        out.push_str(&format!("Text: {}\n", lines.join("\n")));
    }
    if let Some(url) = &record.image_url {
        out.push_str(&format!("Image: {}\n", url));
    }
    if let Some(url) = &record.video_url {
        out.push_str(&format!("Video: {}\n", url));
    }
    if record.has_document {
        out.push_str("Document: attached (content not captured)\n");
    }
    out.push_str(&"-".repeat(SEPARATOR_WIDTH));
    out.push('\n');
}

#[derive(Serialize)]
struct ConversationExport<'a> {
    conversation: &'a ConversationId,
    messages: &'a [MessageRecord],
}

pub fn encode_json(aggregator: &Aggregator) -> Result<String, ExportError> {
    let conversations: Vec<ConversationExport<'_>> = aggregator
        .snapshot()
        .map(|(conversation, messages)| ConversationExport {
            conversation,
            messages,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&conversations)?)
}

/// `<prefix>_<timestamp>.<ext>` with anything unsafe for filenames replaced.
pub fn export_filename(prefix: &str, format: ExportFormat, now: NaiveDateTime) -> String {
    let stamp = now.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
    format!(
        "{}_{}.{}",
        sanitize(prefix),
        sanitize(&stamp),
        format.extension()
    )
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DedupKey, KeySignals};
    use crate::timestamp::TimestampQuality;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Vec<ExportDocument>,
        fail: bool,
    }

    impl ExportSink for RecordingSink {
        fn deliver(&mut self, document: &ExportDocument) -> Result<(), ExportError> {
            if self.fail {
                return Err(ExportError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.delivered.push(document.clone());
            Ok(())
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 5)
            .unwrap()
            .and_hms_milli_opt(18, 4, 9, 27)
            .unwrap()
    }

    fn accept(aggregator: &mut Aggregator, conversation: &str, label: &str, text: &str) {
        let lines = vec![text.to_string()];
        let key = DedupKey::compute(
            label,
            KeySignals {
                text: Some(&lines),
                ..Default::default()
            },
        );
        aggregator.accept_if_new(
            &ConversationId::from(conversation),
            key,
            MessageRecord {
                timestamp: now(),
                timestamp_quality: TimestampQuality::Exact,
                raw_timestamp_label: label.to_string(),
                sender: None,
                text: Some(lines),
                image_url: None,
                video_url: None,
                has_document: false,
            },
        );
    }

    fn alice_and_bob() -> Aggregator {
        let mut aggregator = Aggregator::new();
        accept(&mut aggregator, "Alice", "[10:15, 05/06/2024]", "Hello");
        accept(&mut aggregator, "Bob", "[11:00, 05/06/2024]", "First");
        accept(&mut aggregator, "Bob", "[11:01, 05/06/2024]", "Second");
        aggregator
    }

    #[test]
    fn test_text_export_groups_by_conversation() {
        let text = encode_text(&alice_and_bob());

        let alice = text.find("=== Alice ===").unwrap();
        let bob = text.find("=== Bob ===").unwrap();
        let first = text.find("Text: First").unwrap();
        let second = text.find("Text: Second").unwrap();
        assert!(alice < bob);
        assert!(bob < first && first < second);
        assert!(text.contains("\n\n=== Bob ===\n"));
        assert_eq!(text.matches(&"-".repeat(SEPARATOR_WIDTH)).count(), 3);
    }

    #[test]
    fn test_entry_renders_optional_fields() {
        let mut out = String::new();
        render_entry(
            &mut out,
            &MessageRecord {
                timestamp: now(),
                timestamp_quality: TimestampQuality::Exact,
                raw_timestamp_label: "[10:15, 05/06/2024] Alice: ".to_string(),
                sender: Some("Alice".to_string()),
                text: None,
                image_url: Some("blob:https://web.host/i".to_string()),
                video_url: None,
                has_document: true,
            },
        );
        assert_eq!(
            out,
            format!(
                "Time: [10:15, 05/06/2024]\nFrom: Alice\nImage: blob:https://web.host/i\nDocument: attached (content not captured)\n{}\n",
                "-".repeat(SEPARATOR_WIDTH)
            )
        );
    }

    #[test]
    fn test_entry_without_sender_keeps_label() {
        let mut out = String::new();
        render_entry(
            &mut out,
            &MessageRecord {
                timestamp: now(),
                timestamp_quality: TimestampQuality::TimeOnly,
                raw_timestamp_label: " 11:02 ".to_string(),
                sender: None,
                text: Some(vec!["Hi".to_string()]),
                image_url: None,
                video_url: None,
                has_document: false,
            },
        );
        assert!(out.starts_with("Time: 11:02\nText: Hi\n"));
        assert!(!out.contains("From:"));
    }

    #[test]
    fn test_empty_export_skips_sink() {
        let mut sink = RecordingSink::default();
        let outcome = export(&Aggregator::new(), &mut sink, &ExportConfig::default(), now());
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(sink.delivered.is_empty());
    }

    #[test]
    fn test_export_delivers_document() {
        let mut sink = RecordingSink::default();
        let outcome = export(&alice_and_bob(), &mut sink, &ExportConfig::default(), now());

        assert_eq!(
            outcome,
            ExportOutcome::Delivered {
                filename: "chat_export_2024-06-05T18-04-09-027.txt".to_string(),
                conversations: 2,
                records: 3,
            }
        );
        assert_eq!(sink.delivered.len(), 1);
        assert!(sink.delivered[0].payload.starts_with("=== Alice ==="));
    }

    #[test]
    fn test_sink_failure_becomes_outcome() {
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let outcome = export(&alice_and_bob(), &mut sink, &ExportConfig::default(), now());
        assert!(matches!(outcome, ExportOutcome::Failed { .. }));
        assert!(outcome.notice().contains("read-only"));
    }

    #[test]
    fn test_json_export() {
        let config = ExportConfig {
            format: ExportFormat::Json,
            ..Default::default()
        };
        let document = build_document(&alice_and_bob(), &config, now())
            .unwrap()
            .unwrap();
        assert!(document.filename.ends_with(".json"));

        let value: serde_json::Value = serde_json::from_str(&document.payload).unwrap();
        assert_eq!(value[0]["conversation"], "Alice");
        assert_eq!(value[1]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(value[1]["messages"][1]["text"][0], "Second");
    }

    #[test]
    fn test_filename_is_sanitized() {
        let name = export_filename("my chats/2024", ExportFormat::Text, now());
        assert_eq!(name, "my-chats-2024_2024-06-05T18-04-09-027.txt");
    }

    #[test]
    fn test_file_sink_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("exports"));
        let document = ExportDocument {
            filename: "out.txt".to_string(),
            payload: "=== Alice ===\n".to_string(),
        };

        sink.deliver(&document).unwrap();
        let written = std::fs::read_to_string(sink.dir().join("out.txt")).unwrap();
        assert_eq!(written, "=== Alice ===\n");
    }
}
