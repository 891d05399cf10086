use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Copies shorter than this many characters are treated as accidental.
pub const MIN_RESPONSE_CHARS: usize = 20;

/// One rendered human turn. `content` is empty when the raw text could not
/// be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanMessage {
    pub index: usize,
    pub content: String,
}

impl HumanMessage {
    pub fn is_recovered(&self) -> bool {
        !self.content.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaudeResponse {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Code,
    Html,
    React,
    Svg,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Html => "html",
            ArtifactKind::React => "react",
            ArtifactKind::Svg => "svg",
        }
    }

    /// Map a stored type tag (plain name or MIME type) to a kind.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "code" | "application/vnd.ant.code" => Some(ArtifactKind::Code),
            "html" | "text/html" => Some(ArtifactKind::Html),
            "react" | "application/vnd.ant.react" => Some(ArtifactKind::React),
            "svg" | "image/svg+xml" => Some(ArtifactKind::Svg),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub index: usize,
    pub title: String,
    pub language: String,
    pub content: String,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    TextFile,
    File,
    Image,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::TextFile => "text_file",
            AttachmentKind::File => "file",
            AttachmentKind::Image => "image",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which harvesting pass produced an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSource {
    Container,
    DocumentViewer,
    TextScan,
    Storage,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub index: usize,
    pub kind: AttachmentKind,
    pub filename: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub dimensions: Option<(u32, u32)>,
    pub source: AttachmentSource,
    /// Human message this attachment belongs to, when it could be placed.
    pub message_index: Option<usize>,
}

impl Attachment {
    pub fn text(
        index: usize,
        filename: impl Into<String>,
        content: impl Into<String>,
        source: AttachmentSource,
    ) -> Self {
        Self {
            index,
            kind: AttachmentKind::TextFile,
            filename: filename.into(),
            content: Some(content.into()),
            url: None,
            dimensions: None,
            source,
            message_index: None,
        }
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }
}

/// Everything one export run collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    pub messages: Vec<HumanMessage>,
    pub responses: Vec<ClaudeResponse>,
    pub artifacts: Vec<Artifact>,
    pub attachments: Vec<Attachment>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.responses.is_empty()
    }

    pub fn attachments_with_content(&self) -> usize {
        self.attachments.iter().filter(|a| a.has_content()).count()
    }
}

/// True when some artifact already carries `content` (trimmed comparison).
pub fn artifact_content_seen(artifacts: &[Artifact], content: &str) -> bool {
    let content = content.trim();
    artifacts.iter().any(|a| a.content == content)
}

/// True when some attachment already carries `content` (trimmed comparison).
pub fn attachment_content_seen(attachments: &[Attachment], content: &str) -> bool {
    let content = content.trim();
    attachments
        .iter()
        .any(|a| a.content.as_deref().map(str::trim) == Some(content))
}
