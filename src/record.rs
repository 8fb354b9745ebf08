//! Message records and their identities

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::timestamp::TimestampQuality;

/// Label used when a message element carries no timestamp at all.
pub const UNKNOWN_TIME: &str = "Unknown Time";

const VIDEO_SENTINEL: &str = "video";
const DOCUMENT_SENTINEL: &str = "document";
const KEY_FIELD_SEPARATOR: char = '\u{1f}';

/// Displayed conversation title. Exact string equality, so a renamed
/// conversation is a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(title: &str) -> Self {
        Self::new(title)
    }
}

/// One extracted message. Never mutated after it is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub timestamp: NaiveDateTime,
    pub timestamp_quality: TimestampQuality,
    pub raw_timestamp_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub has_document: bool,
}

/// Heuristic fingerprint of a rendered message.
///
/// Built from the raw timestamp label and the first non-empty signal among
/// text, image URL, a video sentinel and a document sentinel. Two messages
/// with the same label and the same signal collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

/// Content signals feeding a [`DedupKey`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySignals<'a> {
    pub text: Option<&'a [String]>,
    pub image_url: Option<&'a str>,
    pub has_video: bool,
    pub has_document: bool,
}

impl DedupKey {
    pub fn compute(raw_label: &str, signals: KeySignals<'_>) -> Self {
        let text = signals
            .text
            .map(|lines| lines.join("\n"))
            .filter(|text| !text.is_empty());

        let signal = match (text, signals.image_url.filter(|url| !url.is_empty())) {
            (Some(text), _) => text,
            (None, Some(url)) => url.to_string(),
            (None, None) if signals.has_video => VIDEO_SENTINEL.to_string(),
            (None, None) if signals.has_document => DOCUMENT_SENTINEL.to_string(),
            (None, None) => String::new(),
        };

        let mut hasher = Sha256::new();
        hasher.update(raw_label.as_bytes());
        hasher.update(KEY_FIELD_SEPARATOR.to_string().as_bytes());
        hasher.update(signal.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a host label such as `[10:15, 05/06/2024] Alice: ` into the
/// bracketed timestamp and the sender name that follows it.
pub fn split_sender(raw_label: &str) -> (&str, Option<&str>) {
    let trimmed = raw_label.trim();
    if !trimmed.starts_with('[') {
        return (trimmed, None);
    }

    match trimmed.find(']') {
        Some(close) => {
            let (stamp, rest) = trimmed.split_at(close + 1);
            let sender = rest.trim().trim_end_matches(':').trim();
            if sender.is_empty() {
                (stamp, None)
            } else {
                (stamp, Some(sender))
            }
        }
        None => (trimmed, None),
    }
}
