//! Harvests generated artifacts from three overlapping sources.
//!
//! Passes run in a fixed order (visible containers, client storage, bare
//! code blocks) and each later pass only adds content no earlier pass
//! produced, so the most specific source wins.

use tracing::{debug, info};

use crate::heuristics::{language_from_class, Heuristics, FALLBACK_LANGUAGE};
use crate::model::{artifact_content_seen, Artifact, ArtifactKind};
use crate::port::{ClientStorage, NodeId, Page};
use crate::sanitize::sanitize_filename;
use crate::selectors::SelectorRegistry;
use crate::storage::StorageScanner;

/// Code blocks shorter than this are inline snippets, not artifacts.
pub const MIN_CODE_BLOCK_CHARS: usize = 100;

pub struct ArtifactExtractor<'a> {
    page: &'a dyn Page,
    storage: &'a dyn ClientStorage,
    selectors: &'a SelectorRegistry,
    heuristics: &'a dyn Heuristics,
}

impl<'a> ArtifactExtractor<'a> {
    pub fn new(
        page: &'a dyn Page,
        storage: &'a dyn ClientStorage,
        selectors: &'a SelectorRegistry,
        heuristics: &'a dyn Heuristics,
    ) -> Self {
        Self {
            page,
            storage,
            selectors,
            heuristics,
        }
    }

    pub fn extract(&self) -> Vec<Artifact> {
        info!("extracting artifacts");
        let mut artifacts = Vec::new();
        self.from_containers(&mut artifacts);
        self.from_storage(&mut artifacts);
        self.from_code_blocks(&mut artifacts);
        info!(count = artifacts.len(), "artifacts extracted");
        artifacts
    }

    fn from_containers(&self, artifacts: &mut Vec<Artifact>) {
        let containers = self.page.query_all(&self.selectors.artifact_container);
        for (i, container) in containers.into_iter().enumerate() {
            let Some(artifact) = self.read_container(container, i) else {
                debug!(artifact = i + 1, "skipping empty artifact container");
                continue;
            };
            if artifact_content_seen(artifacts, &artifact.content) {
                debug!(artifact = i + 1, "duplicate artifact content");
                continue;
            }
            debug!(
                title = %artifact.title,
                language = %artifact.language,
                "artifact from container"
            );
            artifacts.push(Artifact {
                index: artifacts.len(),
                ..artifact
            });
        }
    }

    fn read_container(&self, container: NodeId, ordinal: usize) -> Option<Artifact> {
        let page = self.page;
        let raw = page
            .query_within(container, &self.selectors.artifact_code)
            .first()
            .map(|&code| page.text_content(code))
            .unwrap_or_else(|| page.text_content(container));
        let content = raw.trim();
        if content.is_empty() {
            return None;
        }

        let title = page
            .attribute(container, "data-artifact-title")
            .filter(|t| !t.is_empty())
            .or_else(|| {
                page.query_within(container, &self.selectors.artifact_title)
                    .first()
                    .map(|&t| page.text_content(t))
                    .filter(|t| !t.trim().is_empty())
            })
            .unwrap_or_else(|| format!("artifact_{}", ordinal + 1));

        let language = page
            .attribute(container, "data-artifact-language")
            .or_else(|| page.attribute(container, "data-language"))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.heuristics.language_or_fallback(&page.class_name(container)));

        let kind = self
            .heuristics
            .classify_artifact(&page.text_content(container), &language);

        Some(Artifact {
            index: ordinal,
            title: sanitize_filename(&title),
            language,
            content: content.to_string(),
            kind,
        })
    }

    fn from_storage(&self, artifacts: &mut Vec<Artifact>) {
        let records = StorageScanner::new(self.storage).artifact_records();
        for (n, record) in records.into_iter().enumerate() {
            let Some(content) = record.content.filter(|c| !c.trim().is_empty()) else {
                continue;
            };
            if artifact_content_seen(artifacts, &content) {
                continue;
            }
            let language = record
                .language
                .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string());
            let kind = record
                .type_tag
                .as_deref()
                .and_then(ArtifactKind::from_type_tag)
                .unwrap_or_else(|| self.heuristics.classify_artifact(&content, &language));
            let title = record
                .title
                .unwrap_or_else(|| format!("artifact_from_storage_{}", n + 1));

            debug!(title = %title, "artifact from storage");
            artifacts.push(Artifact {
                index: artifacts.len(),
                title,
                language,
                content: content.trim().to_string(),
                kind,
            });
        }
    }

    fn from_code_blocks(&self, artifacts: &mut Vec<Artifact>) {
        for block in self.page.query_all(&self.selectors.code_block) {
            let text = self.page.text_content(block);
            let content = text.trim();
            if content.chars().count() <= MIN_CODE_BLOCK_CHARS
                || artifact_content_seen(artifacts, content)
            {
                continue;
            }
            let class = self.page.class_name(block);
            let language = language_from_class(&class)
                .unwrap_or_else(|| self.heuristics.language_or_fallback(&class));

            debug!(block = %block, language = %language, "code block captured as artifact");
            artifacts.push(Artifact {
                index: artifacts.len(),
                title: format!("code_block_{}", artifacts.len() + 1),
                language,
                content: content.to_string(),
                kind: ArtifactKind::Code,
            });
        }
    }
}
