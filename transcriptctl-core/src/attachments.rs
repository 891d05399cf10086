//! Harvests uploaded files and their inline content from five sources.
//!
//! Passes run in order: attachment-styled containers, document viewers,
//! the large text-block scan, client storage, then images. Later passes
//! skip anything an earlier pass already produced (by trimmed content,
//! by filename for content-less and stored files, by URL for images).
//!
//! Attachments found on the page are tied to at most one human message:
//! the one sharing their message group, otherwise the next user message
//! after them in page order.

use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::heuristics::Heuristics;
use crate::model::{attachment_content_seen, Artifact, Attachment, AttachmentKind, AttachmentSource};
use crate::port::{ClientStorage, NodeId, Page};
use crate::selectors::SelectorRegistry;
use crate::storage::StorageScanner;
use crate::textscan::TextBlockScanner;

/// Viewer text at or below this many characters is ignored.
pub const MIN_DOCUMENT_CHARS: usize = 100;

pub struct AttachmentExtractor<'a> {
    page: &'a dyn Page,
    storage: &'a dyn ClientStorage,
    selectors: &'a SelectorRegistry,
    heuristics: &'a dyn Heuristics,
    images: &'a ImageConfig,
}

/// Where each rendered user message sits, for association.
struct MessageAnchors {
    turns: Vec<(usize, NodeId)>,
}

impl<'a> AttachmentExtractor<'a> {
    pub fn new(
        page: &'a dyn Page,
        storage: &'a dyn ClientStorage,
        selectors: &'a SelectorRegistry,
        heuristics: &'a dyn Heuristics,
        images: &'a ImageConfig,
    ) -> Self {
        Self {
            page,
            storage,
            selectors,
            heuristics,
            images,
        }
    }

    /// Run all five passes. `artifacts` feeds the text-block dedup.
    pub fn extract(&self, artifacts: &[Artifact]) -> Vec<Attachment> {
        info!("extracting attachments");
        let anchors = self.message_anchors();
        let mut attachments = Vec::new();

        self.from_containers(&anchors, &mut attachments);
        self.from_document_viewers(&anchors, &mut attachments);
        self.from_text_blocks(&anchors, artifacts, &mut attachments);
        self.from_storage(&mut attachments);
        self.from_images(&anchors, &mut attachments);

        let with_content = attachments.iter().filter(|a| a.has_content()).count();
        info!(count = attachments.len(), with_content, "attachments extracted");
        attachments
    }

    fn message_anchors(&self) -> MessageAnchors {
        let turns = self
            .page
            .query_all(&self.selectors.user_message)
            .into_iter()
            .map(|turn| (self.page.document_order(turn), turn))
            .collect();
        MessageAnchors { turns }
    }

    /// Index of the human message `node` belongs to.
    fn message_for(&self, anchors: &MessageAnchors, node: NodeId) -> Option<usize> {
        if let Some(group) = self.page.closest(node, &self.selectors.message_group) {
            let in_group = self.page.query_within(group, &self.selectors.user_message);
            if let Some(first) = in_group.first() {
                if let Some(index) = anchors.turns.iter().position(|(_, t)| t == first) {
                    return Some(index);
                }
            }
        }
        let order = self.page.document_order(node);
        anchors.turns.iter().position(|(o, _)| *o > order)
    }

    fn push(&self, attachments: &mut Vec<Attachment>, mut attachment: Attachment) {
        attachment.index = attachments.len();
        debug!(
            filename = %attachment.filename,
            kind = %attachment.kind,
            source = ?attachment.source,
            message = ?attachment.message_index,
            "attachment"
        );
        attachments.push(attachment);
    }

    fn from_containers(&self, anchors: &MessageAnchors, attachments: &mut Vec<Attachment>) {
        let page = self.page;
        let containers = page.query_all(&self.selectors.attachment_container);
        for (i, container) in containers.into_iter().enumerate() {
            let filename = page
                .attribute(container, "data-filename")
                .filter(|f| !f.is_empty())
                .or_else(|| page.attribute(container, "title").filter(|t| !t.is_empty()))
                .or_else(|| {
                    page.query_within(container, &self.selectors.attachment_filename)
                        .first()
                        .map(|&f| page.text_content(f).trim().to_string())
                        .filter(|f| !f.is_empty())
                })
                .or_else(|| {
                    let text = page.text_content(container);
                    text.lines()
                        .next()
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                })
                .unwrap_or_else(|| format!("attachment_{}", i + 1));

            let content = page
                .attribute(container, "data-content")
                .or_else(|| page.attribute(container, "data-file-content"))
                .filter(|c| !c.is_empty())
                .or_else(|| {
                    page.query_within(container, &self.selectors.attachment_content)
                        .first()
                        .map(|&c| page.text_content(c))
                })
                .filter(|c| !c.trim().is_empty());

            let duplicate = match &content {
                Some(text) => attachment_content_seen(attachments, text),
                None => attachments
                    .iter()
                    .any(|a| !a.has_content() && a.filename == filename),
            };
            if duplicate {
                debug!(container = i + 1, "duplicate attachment container");
                continue;
            }

            let kind = if content.is_some() {
                AttachmentKind::TextFile
            } else {
                AttachmentKind::File
            };
            self.push(
                attachments,
                Attachment {
                    index: 0,
                    kind,
                    filename,
                    content: content.map(|c| c.trim().to_string()),
                    url: None,
                    dimensions: None,
                    source: AttachmentSource::Container,
                    message_index: self.message_for(anchors, container),
                },
            );
        }
    }

    fn from_document_viewers(&self, anchors: &MessageAnchors, attachments: &mut Vec<Attachment>) {
        let page = self.page;
        for (i, viewer) in page.query_all(&self.selectors.document_viewer).into_iter().enumerate() {
            let text = page.text_content(viewer);
            let content = text.trim();
            if content.chars().count() <= MIN_DOCUMENT_CHARS
                || attachment_content_seen(attachments, content)
            {
                continue;
            }
            let filename = page
                .closest(viewer, &self.selectors.filename_holder)
                .and_then(|holder| page.attribute(holder, "data-filename"))
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| format!("document_{}.txt", i + 1));

            let mut attachment =
                Attachment::text(0, filename, content, AttachmentSource::DocumentViewer);
            attachment.message_index = self.message_for(anchors, viewer);
            self.push(attachments, attachment);
        }
    }

    fn from_text_blocks(
        &self,
        anchors: &MessageAnchors,
        artifacts: &[Artifact],
        attachments: &mut Vec<Attachment>,
    ) {
        let blocks = TextBlockScanner::new(self.page, self.selectors, self.heuristics)
            .scan(artifacts, attachments);
        for block in blocks {
            let filename = format!("text_block_{}.txt", attachments.len() + 1);
            let mut attachment =
                Attachment::text(0, filename, block.content, AttachmentSource::TextScan);
            attachment.message_index = self.message_for(anchors, block.node);
            self.push(attachments, attachment);
        }
    }

    fn from_storage(&self, attachments: &mut Vec<Attachment>) {
        for file in StorageScanner::new(self.storage).file_records() {
            let filename = file
                .name
                .unwrap_or_else(|| format!("stored_file_{}", attachments.len() + 1));
            if attachments.iter().any(|a| a.filename == filename)
                || attachment_content_seen(attachments, &file.content)
            {
                debug!(key = %file.key, "stored file already captured");
                continue;
            }
            self.push(
                attachments,
                Attachment::text(0, filename, file.content.trim(), AttachmentSource::Storage),
            );
        }
    }

    fn from_images(&self, anchors: &MessageAnchors, attachments: &mut Vec<Attachment>) {
        let page = self.page;
        for (i, image) in page.query_all(&self.selectors.image).into_iter().enumerate() {
            let Some(src) = page.attribute(image, "src").filter(|s| !s.is_empty()) else {
                continue;
            };
            if self.images.is_excluded(&src) {
                debug!(src = %src, "skipping interface image");
                continue;
            }
            if attachments.iter().any(|a| a.url.as_deref() == Some(src.as_str())) {
                continue;
            }
            let filename = page
                .attribute(image, "alt")
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| format!("image_{}", i + 1));

            self.push(
                attachments,
                Attachment {
                    index: 0,
                    kind: AttachmentKind::Image,
                    filename,
                    content: None,
                    url: Some(src),
                    dimensions: Some(page.dimensions(image)),
                    source: AttachmentSource::Image,
                    message_index: self.message_for(anchors, image),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::DefaultHeuristics;
    use crate::snapshot::{PageSnapshot, SnapshotNode, SnapshotPage};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn extract(body: SnapshotNode, storage: BTreeMap<String, String>) -> Vec<Attachment> {
        let page = SnapshotPage::new(PageSnapshot {
            url: None,
            body,
            local_storage: storage,
        });
        let selectors = SelectorRegistry::default();
        let images = ImageConfig::default();
        AttachmentExtractor::new(&page, &page, &selectors, &DefaultHeuristics, &images).extract(&[])
    }

    fn user_turn(text: &str) -> SnapshotNode {
        SnapshotNode::new("div")
            .attr("data-testid", "user-message")
            .text(text)
    }

    #[test]
    fn identical_content_from_two_sources_is_kept_once() {
        let notes = "meeting notes ".repeat(20);
        let body = SnapshotNode::new("body").children([
            SnapshotNode::new("div")
                .class("group")
                .child(
                    SnapshotNode::new("div")
                        .class("attachment")
                        .attr("data-filename", "notes.txt")
                        .attr("data-content", notes.clone()),
                )
                .child(user_turn("see attached")),
            SnapshotNode::new("div")
                .class("document")
                .text(notes.clone()),
        ]);
        let storage = BTreeMap::from([(
            "upload-1".to_string(),
            json!({"name": "copy.txt", "content": notes}).to_string(),
        )]);

        let attachments = extract(body, storage);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "notes.txt");
        assert_eq!(attachments[0].kind, AttachmentKind::TextFile);
        assert_eq!(attachments[0].message_index, Some(0));
    }

    #[test]
    fn filename_fallback_chain() {
        let body = SnapshotNode::new("body").children([
            SnapshotNode::new("div").class("file-chip").attr("title", "report.pdf"),
            SnapshotNode::new("div")
                .class("file-chip")
                .child(SnapshotNode::new("span").class("filename").text(" data.csv ")),
            SnapshotNode::new("div").class("file-chip").text("first line\nsecond"),
            SnapshotNode::new("div").class("file-chip"),
            SnapshotNode::new("div").class("file-chip").attr("title", "report.pdf"),
        ]);
        let attachments = extract(body, BTreeMap::new());
        let names: Vec<_> = attachments.iter().map(|a| a.filename.as_str()).collect();
        // the "filename" span is itself file-styled and collapses into data.csv
        assert_eq!(names, ["report.pdf", "data.csv", "first line", "attachment_5"]);
        assert!(attachments.iter().all(|a| a.kind == AttachmentKind::File));
    }

    #[test]
    fn association_prefers_group_then_next_message() {
        let body = SnapshotNode::new("body").children([
            SnapshotNode::new("div")
                .class("group")
                .child(user_turn("first")),
            SnapshotNode::new("div").class("upload").attr("title", "loose.txt"),
            SnapshotNode::new("div")
                .class("group")
                .child(user_turn("second")),
            SnapshotNode::new("div").class("upload").attr("title", "trailing.txt"),
        ]);
        let attachments = extract(body, BTreeMap::new());
        assert_eq!(attachments[0].message_index, Some(1));
        assert_eq!(attachments[1].message_index, None);
    }

    #[test]
    fn images_skip_interface_art_and_repeat_urls() {
        let body = SnapshotNode::new("body").children([
            SnapshotNode::new("img")
                .attr("src", "https://claude.ai/images/avatar.png"),
            SnapshotNode::new("img")
                .attr("src", "https://claude.ai/uploads/chart.png")
                .attr("alt", "chart")
                .attr("width", "640")
                .attr("height", "480"),
            SnapshotNode::new("img").attr("src", "https://claude.ai/uploads/chart.png"),
            SnapshotNode::new("img").attr("src", "https://cdn.example/artifact/x.png"),
        ]);
        let attachments = extract(body, BTreeMap::new());
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].filename, "chart");
        assert_eq!(attachments[0].dimensions, Some((640, 480)));
        assert_eq!(attachments[1].filename, "image_4");
        assert!(attachments.iter().all(|a| a.content.is_none()));
    }

    #[test]
    fn stored_files_dedupe_by_name() {
        let body = SnapshotNode::new("body")
            .child(SnapshotNode::new("div").class("attachment").attr("data-filename", "a.txt"));
        let storage = BTreeMap::from([
            ("file:a".to_string(), json!({"name": "a.txt", "content": "A"}).to_string()),
            ("file:b".to_string(), json!({"text": "B"}).to_string()),
        ]);
        let attachments = extract(body, storage);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[1].filename, "stored_file_2");
        assert_eq!(attachments[1].source, AttachmentSource::Storage);
        assert_eq!(attachments[1].message_index, None);
    }
}
