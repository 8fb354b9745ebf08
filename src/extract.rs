//! Message record extraction
//!
//! One scan walks every message element currently rendered for a
//! conversation, builds a candidate record and key for each, and hands new
//! ones to the aggregator. A broken element is reported and skipped; it never
//! stops the rest of the scan.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::error::HostError;
use crate::host::{Clock, HostTree, ImageElement, MessageNode, VideoElement};
use crate::media::{is_blob, is_http, MediaResolver};
use crate::record::{split_sender, ConversationId, DedupKey, KeySignals, MessageRecord, UNKNOWN_TIME};
use crate::timestamp;

/// A message element that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementFailure {
    /// Position of the element within the scan.
    pub index: usize,
    pub error: HostError,
}

/// Outcome of one extraction pass over a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub identity: ConversationId,
    pub examined: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub failures: Vec<ElementFailure>,
}

/// A record together with the key it will be deduplicated by.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: DedupKey,
    pub record: MessageRecord,
}

/// Scan every message element of `tree` into `aggregator` under `identity`.
///
/// Fails only when the element list itself cannot be read; the aggregator is
/// untouched in that case.
pub fn scan<T: HostTree>(
    tree: &T,
    identity: &ConversationId,
    resolver: &mut MediaResolver,
    aggregator: &mut Aggregator,
    clock: &dyn Clock,
) -> Result<ScanReport, HostError> {
    let nodes = tree.message_nodes()?;
    let now = clock.now();

    let mut report = ScanReport {
        identity: identity.clone(),
        examined: nodes.len(),
        accepted: 0,
        duplicates: 0,
        failures: vec![],
    };

    for (index, node) in nodes.iter().enumerate() {
        let candidate = match extract_candidate(node, resolver, now) {
            Ok(candidate) => candidate,
            Err(error) => {
                warn!(conversation = %identity, index, %error, "skipping message element");
                report.failures.push(ElementFailure { index, error });
                continue;
            }
        };

        if aggregator.contains(identity, &candidate.key) {
            report.duplicates += 1;
            continue;
        }

        debug!(
            conversation = %identity,
            label = %candidate.record.raw_timestamp_label,
            key = %candidate.key,
            "new message"
        );
        if aggregator.accept_if_new(identity, candidate.key, candidate.record) {
            report.accepted += 1;
        } else {
            report.duplicates += 1;
        }
    }

    Ok(report)
}

/// Build the candidate record for one message element.
pub fn extract_candidate<N: MessageNode>(
    node: &N,
    resolver: &mut MediaResolver,
    now: NaiveDateTime,
) -> Result<Candidate, HostError> {
    let spans = node.text_spans()?;
    let images = node.images()?;
    let videos = node.videos()?;
    let has_document = node.has_document();

    let raw_label = raw_timestamp_label(node);
    let (stamp, sender) = split_sender(&raw_label);
    let normalized = timestamp::normalize(stamp, now);
    let sender = sender.map(String::from);

    let lines: Vec<String> = spans
        .iter()
        .map(|span| span.trim())
        .filter(|span| !span.is_empty())
        .map(String::from)
        .collect();
    let text = if lines.is_empty() { None } else { Some(lines) };

    let image_url = preferred_image(&images).and_then(|image| resolver.resolve_image(image));
    let video = preferred_video(&videos);
    let video_url = video.and_then(|video| resolver.resolve_video(video));

    let key = DedupKey::compute(
        &raw_label,
        KeySignals {
            text: text.as_deref(),
            image_url: image_url.as_deref(),
            has_video: video.is_some(),
            has_document,
        },
    );

    Ok(Candidate {
        key,
        record: MessageRecord {
            timestamp: normalized.value,
            timestamp_quality: normalized.quality,
            raw_timestamp_label: raw_label,
            sender,
            text,
            image_url,
            video_url,
            has_document,
        },
    })
}

fn raw_timestamp_label<N: MessageNode>(node: &N) -> String {
    node.timestamp_attribute()
        .filter(|label| !label.trim().is_empty())
        .or_else(|| node.timestamp_text().filter(|label| !label.trim().is_empty()))
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Blob sources first, then http(s), then anything else.
fn source_rank(src: &str) -> u8 {
    if is_blob(src) {
        0
    } else if is_http(src) {
        1
    } else {
        2
    }
}

fn preferred_image(images: &[ImageElement]) -> Option<&ImageElement> {
    images
        .iter()
        .min_by_key(|image| image.src.as_deref().map_or(3, source_rank))
}

fn preferred_video(videos: &[VideoElement]) -> Option<&VideoElement> {
    videos.iter().min_by_key(|video| {
        video
            .src
            .iter()
            .chain(video.sources.iter())
            .map(|src| source_rank(src))
            .min()
            .unwrap_or(3)
    })
}
