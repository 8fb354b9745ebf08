//! Recorded host trees
//!
//! Serde-friendly snapshots of a conversation view. Replay traces are made of
//! these, and the pipeline tests build them by hand.

use serde::{Deserialize, Serialize};

use super::{HostTree, ImageElement, MessageNode, VideoElement};
use crate::error::HostError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureTree {
    #[serde(default = "default_workspace")]
    pub workspace: bool,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub messages: Vec<FixtureMessage>,

    /// When set, querying the message list fails with this reason.
    #[serde(default)]
    pub unavailable: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureMessage {
    #[serde(default)]
    pub pre_plain_text: Option<String>,

    #[serde(default)]
    pub time_text: Option<String>,

    #[serde(default)]
    pub spans: Vec<String>,

    #[serde(default)]
    pub images: Vec<ImageElement>,

    #[serde(default)]
    pub videos: Vec<VideoElement>,

    #[serde(default)]
    pub document: bool,

    /// When set, the element's structural accessors fail with this reason.
    #[serde(default)]
    pub malformed: Option<String>,
}

fn default_workspace() -> bool {
    true
}

impl Default for FixtureTree {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            title: None,
            messages: vec![],
            unavailable: None,
        }
    }
}

impl FixtureTree {
    /// An open conversation titled `title` showing `messages`.
    pub fn conversation(title: &str, messages: Vec<FixtureMessage>) -> Self {
        Self {
            title: Some(title.to_string()),
            messages,
            ..Default::default()
        }
    }

    /// The host before its workspace container has rendered.
    pub fn loading() -> Self {
        Self {
            workspace: false,
            ..Default::default()
        }
    }
}

impl FixtureMessage {
    /// A plain text message with a structured timestamp attribute.
    pub fn text(label: &str, text: &str) -> Self {
        Self {
            pre_plain_text: Some(label.to_string()),
            spans: vec![text.to_string()],
            ..Default::default()
        }
    }

    fn check(&self) -> Result<(), HostError> {
        match &self.malformed {
            Some(reason) => Err(HostError::Structure(reason.clone())),
            None => Ok(()),
        }
    }
}

impl MessageNode for FixtureMessage {
    fn timestamp_attribute(&self) -> Option<String> {
        self.pre_plain_text.clone()
    }

    fn timestamp_text(&self) -> Option<String> {
        self.time_text.clone()
    }

    fn text_spans(&self) -> Result<Vec<String>, HostError> {
        self.check()?;
        Ok(self.spans.clone())
    }

    fn images(&self) -> Result<Vec<ImageElement>, HostError> {
        self.check()?;
        Ok(self.images.clone())
    }

    fn videos(&self) -> Result<Vec<VideoElement>, HostError> {
        self.check()?;
        Ok(self.videos.clone())
    }

    fn has_document(&self) -> bool {
        self.document
    }
}

impl HostTree for FixtureTree {
    type Node = FixtureMessage;

    fn workspace_present(&self) -> bool {
        self.workspace
    }

    fn conversation_title(&self) -> Option<String> {
        if !self.workspace {
            return None;
        }
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(String::from)
    }

    fn message_nodes(&self) -> Result<Vec<FixtureMessage>, HostError> {
        if !self.workspace {
            return Err(HostError::Unavailable("workspace not rendered".to_string()));
        }
        if let Some(reason) = &self.unavailable {
            return Err(HostError::Unavailable(reason.clone()));
        }
        Ok(self.messages.clone())
    }
}
