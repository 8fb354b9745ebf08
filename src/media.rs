//! Media reference resolution
//!
//! Turns image and video elements into usable references. Transient blob
//! references are announced once through the ledger; small inline-encoded
//! sources are blurred placeholders and never returned.

use std::collections::HashSet;
use tracing::info;

use crate::config::MediaConfig;
use crate::host::{ImageElement, VideoElement};

const BLOB_SCHEME: &str = "blob:";
const INLINE_SCHEME: &str = "data:";

pub fn is_blob(src: &str) -> bool {
    src.starts_with(BLOB_SCHEME)
}

pub fn is_inline(src: &str) -> bool {
    src.starts_with(INLINE_SCHEME)
}

pub fn is_http(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Ephemeral references already announced, kept apart per media kind.
#[derive(Debug, Default)]
pub struct MediaUrlLedger {
    images: HashSet<String>,
    videos: HashSet<String>,
}

impl MediaUrlLedger {
    /// Returns true the first time `url` is recorded.
    pub fn record_image(&mut self, url: &str) -> bool {
        self.images.insert(url.to_string())
    }

    /// Returns true the first time `url` is recorded.
    pub fn record_video(&mut self, url: &str) -> bool {
        self.videos.insert(url.to_string())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn video_count(&self) -> usize {
        self.videos.len()
    }
}

pub struct MediaResolver {
    placeholder_max_len: usize,
    min_dimension_px: u32,
    ledger: MediaUrlLedger,
}

impl MediaResolver {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            placeholder_max_len: config.placeholder_max_len,
            min_dimension_px: config.min_dimension_px,
            ledger: MediaUrlLedger::default(),
        }
    }

    pub fn ledger(&self) -> &MediaUrlLedger {
        &self.ledger
    }

    /// Best usable reference for an image element, if any.
    pub fn resolve_image(&mut self, image: &ImageElement) -> Option<String> {
        if let Some(src) = image.src.as_deref().filter(|src| !src.is_empty()) {
            if self.is_full_size(image) && self.is_capturable_source(src) {
                if self.ledger.record_image(src) {
                    info!(url = %preview(src), "captured image reference");
                }
                return Some(src.to_string());
            }

            if !is_inline(src) {
                return Some(src.to_string());
            }
        }

        if let Some(alt) = image
            .alt_src
            .as_deref()
            .filter(|alt| !alt.is_empty() && !is_inline(alt))
        {
            return Some(alt.to_string());
        }

        image
            .sibling_sources
            .iter()
            .find(|src| !src.is_empty() && !is_inline(src))
            .cloned()
    }

    /// Blob reference for a video element, returned only the first time it
    /// is seen.
    pub fn resolve_video(&mut self, video: &VideoElement) -> Option<String> {
        let src = video
            .src
            .iter()
            .chain(video.sources.iter())
            .find(|src| is_blob(src))?;

        if self.ledger.record_video(src) {
            info!(url = %src, "captured video reference");
            Some(src.clone())
        } else {
            None
        }
    }

    fn is_capturable_source(&self, src: &str) -> bool {
        is_blob(src) || (is_inline(src) && src.len() >= self.placeholder_max_len)
    }

    fn is_full_size(&self, image: &ImageElement) -> bool {
        image.in_media_container
            && image.width > self.min_dimension_px
            && image.height > self.min_dimension_px
    }
}

fn preview(src: &str) -> &str {
    if is_inline(src) {
        src.get(..48).unwrap_or(src)
    } else {
        src
    }
}
