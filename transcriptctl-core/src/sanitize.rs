use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_FILENAME_CHARS: usize = 100;
pub const FALLBACK_TITLE: &str = "claude_conversation";
pub const FILENAME_SUFFIX: &str = "_full_context.md";

static RESERVED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("reserved regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static UNDERSCORES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("underscore regex"));

/// Turn arbitrary text into a lowercase, filesystem-safe token of at most
/// [`MAX_FILENAME_CHARS`] characters.
///
/// Idempotent: `sanitize_filename(&sanitize_filename(x)) == sanitize_filename(x)`.
pub fn sanitize_filename(input: &str) -> String {
    let replaced = RESERVED_RE.replace_all(input, "_");
    let replaced = WHITESPACE_RE.replace_all(&replaced, "_");
    let collapsed = UNDERSCORES_RE.replace_all(&replaced, "_");
    let lowered = collapsed.trim_matches('_').to_lowercase();

    // Truncation can expose a trailing underscore, so trim once more.
    let truncated: String = lowered.chars().take(MAX_FILENAME_CHARS).collect();
    truncated.trim_end_matches('_').to_string()
}

/// The conversation title as shown on the page plus its filename form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTitle {
    /// Human-readable title, absent when the page shows a placeholder.
    pub display: Option<String>,
    pub slug: String,
}

impl ConversationTitle {
    pub fn from_page_text(raw: Option<&str>) -> Self {
        let trimmed = raw.map(str::trim).unwrap_or("");
        if trimmed.is_empty() || trimmed == "Claude" || trimmed.contains("New conversation") {
            return Self::fallback();
        }
        let slug = sanitize_filename(trimmed);
        if slug.is_empty() {
            return Self::fallback();
        }
        Self {
            display: Some(trimmed.to_string()),
            slug,
        }
    }

    pub fn fallback() -> Self {
        Self {
            display: None,
            slug: FALLBACK_TITLE.to_string(),
        }
    }

    /// `<slug>_full_context.md`
    pub fn filename(&self) -> String {
        format!("{}{}", self.slug, FILENAME_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reserved_and_whitespace() {
        assert_eq!(
            sanitize_filename("  My <Project>: a/b\\c|d?e*f \"q\"  "),
            "my_project_a_b_c_d_e_f_q"
        );
        assert_eq!(sanitize_filename("Tabs\tand\nnewlines"), "tabs_and_newlines");
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("???"), "");
        assert_eq!(sanitize_filename("__a__"), "a");
    }

    #[test]
    fn truncation_never_leaves_trailing_underscore() {
        let input = format!("{} tail", "a".repeat(99));
        let once = sanitize_filename(&input);
        assert_eq!(once, "a".repeat(99));
        assert_eq!(sanitize_filename(&once), once);
    }

    #[test]
    fn title_fallbacks() {
        assert_eq!(ConversationTitle::from_page_text(None).slug, FALLBACK_TITLE);
        assert_eq!(
            ConversationTitle::from_page_text(Some("  Claude ")).slug,
            FALLBACK_TITLE
        );
        assert_eq!(
            ConversationTitle::from_page_text(Some("New conversation")).slug,
            FALLBACK_TITLE
        );
        assert_eq!(ConversationTitle::from_page_text(Some("***")).slug, FALLBACK_TITLE);

        let title = ConversationTitle::from_page_text(Some("Rust Lifetimes 101"));
        assert_eq!(title.display.as_deref(), Some("Rust Lifetimes 101"));
        assert_eq!(title.filename(), "rust_lifetimes_101_full_context.md");
    }
}
