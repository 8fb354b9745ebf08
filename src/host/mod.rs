//! Host tree capability interface
//!
//! The conversation view is owned and mutated by the host. The pipeline only
//! sees it through these traits, which keeps extraction testable against
//! recorded fixtures.

mod fixture;

pub use fixture::{FixtureMessage, FixtureTree};

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

use crate::error::HostError;

/// An `img`-like element attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(default)]
    pub src: Option<String>,
    /// Explicit alternate source attribute, e.g. a lazy-load `data-src`.
    #[serde(default)]
    pub alt_src: Option<String>,
    /// Rendered width in pixels.
    #[serde(default)]
    pub width: u32,
    /// Rendered height in pixels.
    #[serde(default)]
    pub height: u32,
    /// Whether the element sits inside a recognised message/media container.
    #[serde(default)]
    pub in_media_container: bool,
    /// Sources of sibling `img` elements, in document order.
    #[serde(default)]
    pub sibling_sources: Vec<String>,
}

/// A `video`-like element attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoElement {
    #[serde(default)]
    pub src: Option<String>,
    /// Sources of nested `source` children.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// A single inbound or outbound message element.
pub trait MessageNode {
    /// Structured timestamp attribute (`data-pre-plain-text` on the host).
    fn timestamp_attribute(&self) -> Option<String>;

    /// Visible timestamp text used when the attribute is missing.
    fn timestamp_text(&self) -> Option<String>;

    /// Selectable text spans, in document order.
    fn text_spans(&self) -> Result<Vec<String>, HostError>;

    fn images(&self) -> Result<Vec<ImageElement>, HostError>;

    fn videos(&self) -> Result<Vec<VideoElement>, HostError>;

    /// Whether a document attachment marker is present.
    fn has_document(&self) -> bool;
}

/// The observed document tree.
pub trait HostTree {
    type Node: MessageNode;

    /// Whether the conversation workspace container exists yet.
    fn workspace_present(&self) -> bool;

    /// Currently displayed conversation title, if any.
    fn conversation_title(&self) -> Option<String>;

    /// Message-like elements under the workspace, in document order.
    fn message_nodes(&self) -> Result<Vec<Self::Node>, HostError>;
}

/// Source of naive local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock anchored at a fixed origin and advanced explicitly by the caller.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: NaiveDateTime,
    elapsed_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            elapsed_ms: Cell::new(0),
        }
    }

    /// Move the clock to `elapsed_ms` after the origin.
    pub fn set_elapsed(&self, elapsed_ms: u64) {
        self.elapsed_ms.set(elapsed_ms);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = i64::try_from(self.elapsed_ms.get()).unwrap_or(i64::MAX);
        self.origin
            .checked_add_signed(Duration::milliseconds(elapsed))
            .unwrap_or(NaiveDateTime::MAX)
    }
}
