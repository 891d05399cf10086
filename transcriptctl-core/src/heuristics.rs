//! Best-effort classification rules.
//!
//! These guesses are knowingly imprecise, so they sit behind a trait: the
//! extractors only ever call [`Heuristics`], and a caller can swap in its own
//! rules without touching the passes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::ArtifactKind;
use crate::port::{NodeId, Page};
use crate::selectors::SelectorRegistry;

/// Language tag used when nothing better is known.
pub const FALLBACK_LANGUAGE: &str = "text";

static LANGUAGE_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"language-(\w+)").expect("language class regex"));

pub trait Heuristics {
    /// Guess a language from an element's class attribute.
    fn detect_language(&self, class_name: &str) -> Option<String>;

    fn classify_artifact(&self, text: &str, language: &str) -> ArtifactKind;

    /// Whether a large text block looks like something the user uploaded
    /// rather than generated output.
    fn is_likely_upload(&self, page: &dyn Page, node: NodeId, selectors: &SelectorRegistry) -> bool;

    /// [`detect_language`](Self::detect_language) with the documented fallback.
    fn language_or_fallback(&self, class_name: &str) -> String {
        self.detect_language(class_name)
            .unwrap_or_else(|| FALLBACK_LANGUAGE.to_string())
    }
}

/// The rule tables the chat site's markup has historically needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHeuristics;

const CLASS_LANGUAGES: &[(&str, &str)] = &[
    ("python", "python"),
    ("javascript", "javascript"),
    ("html", "html"),
    ("css", "css"),
    ("json", "json"),
    ("markdown", "markdown"),
    ("react", "jsx"),
];

impl Heuristics for DefaultHeuristics {
    fn detect_language(&self, class_name: &str) -> Option<String> {
        CLASS_LANGUAGES
            .iter()
            .find(|(needle, _)| class_name.contains(needle))
            .map(|(_, language)| language.to_string())
    }

    fn classify_artifact(&self, text: &str, language: &str) -> ArtifactKind {
        if language == "html" || text.contains("<!DOCTYPE") {
            ArtifactKind::Html
        } else if language == "jsx" || language == "react" || text.contains("import React") {
            ArtifactKind::React
        } else if language == "svg" || text.contains("<svg") {
            ArtifactKind::Svg
        } else {
            ArtifactKind::Code
        }
    }

    fn is_likely_upload(
        &self,
        page: &dyn Page,
        node: NodeId,
        selectors: &SelectorRegistry,
    ) -> bool {
        page.closest(node, &selectors.response_container).is_none()
            || page.closest(node, &selectors.user_container).is_some()
            || page.closest(node, &selectors.upload_container).is_some()
    }
}

/// Language named by a `language-<name>` class, as syntax highlighters emit.
pub fn language_from_class(class_name: &str) -> Option<String> {
    LANGUAGE_CLASS_RE
        .captures(class_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
