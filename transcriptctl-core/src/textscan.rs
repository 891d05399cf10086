//! Last-resort scan for large text blocks that look like uploaded content.

use tracing::debug;

use crate::heuristics::Heuristics;
use crate::model::{artifact_content_seen, attachment_content_seen, Artifact, Attachment};
use crate::port::{NodeId, Page};
use crate::selectors::SelectorRegistry;

/// Blocks at or below this many characters are ignored.
pub const MIN_TEXT_BLOCK_CHARS: usize = 200;

/// A block the scanner believes the user uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub node: NodeId,
    pub content: String,
}

pub struct TextBlockScanner<'a> {
    page: &'a dyn Page,
    selectors: &'a SelectorRegistry,
    heuristics: &'a dyn Heuristics,
}

impl<'a> TextBlockScanner<'a> {
    pub fn new(
        page: &'a dyn Page,
        selectors: &'a SelectorRegistry,
        heuristics: &'a dyn Heuristics,
    ) -> Self {
        Self {
            page,
            selectors,
            heuristics,
        }
    }

    /// Large blocks not already present among `artifacts` or `attachments`,
    /// in page order, trimmed and deduplicated against each other.
    pub fn scan(&self, artifacts: &[Artifact], attachments: &[Attachment]) -> Vec<TextBlock> {
        let mut found: Vec<TextBlock> = Vec::new();
        for node in self.page.query_all(&self.selectors.text_block) {
            let text = self.page.text_content(node);
            let raw = if text.trim().is_empty() {
                self.page.value(node).unwrap_or_default()
            } else {
                text
            };
            let content = raw.trim();
            if content.chars().count() <= MIN_TEXT_BLOCK_CHARS {
                continue;
            }
            if artifact_content_seen(artifacts, content)
                || attachment_content_seen(attachments, content)
                || found.iter().any(|b| b.content == content)
            {
                continue;
            }
            if !self.heuristics.is_likely_upload(self.page, node, self.selectors) {
                debug!(node = %node, "large block looks generated, skipping");
                continue;
            }
            debug!(node = %node, chars = content.chars().count(), "found text block");
            found.push(TextBlock {
                node,
                content: content.to_string(),
            });
        }
        found
    }
}
