//! Named element patterns for every semantic piece of the chat page.
//!
//! Patterns are written in a small CSS subset so that a browser binding can
//! hand [`Selector::as_str`] straight to `querySelectorAll`, while the
//! in-memory snapshot page evaluates the parsed form with
//! [`Selector::matches`].
//!
//! Supported: type selectors, `*`, `.class`, `#id`, attribute tests
//! (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`), the descendant
//! combinator and comma-separated lists.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::SelectorError;

/// Tree access needed to evaluate a selector.
pub trait SelectorTarget {
    type Node: Copy;

    fn tag(&self, node: Self::Node) -> &str;
    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

/// Compounds joined by descendant combinators.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Word,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let chars: Vec<char> = source.chars().collect();
        let mut pos = 0;
        let mut alternatives = Vec::new();
        let mut compounds = Vec::new();
        let mut last_comma = None;

        loop {
            skip_whitespace(&chars, &mut pos);
            if pos >= chars.len() {
                break;
            }
            if chars[pos] == ',' {
                if compounds.is_empty() {
                    return Err(SelectorError::unexpected(source, pos, ','));
                }
                alternatives.push(Complex {
                    compounds: std::mem::take(&mut compounds),
                });
                last_comma = Some(pos);
                pos += 1;
                continue;
            }
            compounds.push(parse_compound(source, &chars, &mut pos)?);
        }

        if compounds.is_empty() {
            return match last_comma {
                Some(at) => Err(SelectorError::unexpected(source, at, ',')),
                None => Err(SelectorError::Empty),
            };
        }
        alternatives.push(Complex { compounds });

        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Node) -> bool {
        self.alternatives.iter().any(|c| c.matches(tree, node))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Complex {
    fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Node) -> bool {
        let Some((last, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }

        // Descendant-only chains can be matched greedily against the nearest ancestor.
        let mut current = node;
        for compound in ancestors.iter().rev() {
            loop {
                match tree.parent(current) {
                    Some(parent) => {
                        current = parent;
                        if compound.matches(tree, parent) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches<T: SelectorTarget>(&self, tree: &T, node: T::Node) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attr(node, "class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted));
            if !has_all {
                return false;
            }
        }
        self.attrs.iter().all(|test| test.matches(tree.attr(node, &test.name)))
    }
}

impl AttrTest {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let value = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == value,
            AttrOp::Contains => !value.is_empty() && actual.contains(value),
            AttrOp::Prefix => !value.is_empty() && actual.starts_with(value),
            AttrOp::Suffix => !value.is_empty() && actual.ends_with(value),
            AttrOp::Word => actual.split_whitespace().any(|w| w == value),
        }
    }
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn unexpected_at(source: &str, chars: &[char], pos: usize) -> SelectorError {
    match chars.get(pos) {
        Some(&c) => SelectorError::unexpected(source, pos, c),
        None => SelectorError::unterminated(source),
    }
}

fn parse_compound(
    source: &str,
    chars: &[char],
    pos: &mut usize,
) -> Result<Compound, SelectorError> {
    let start = *pos;
    let mut compound = Compound::default();

    if chars[*pos] == '*' {
        *pos += 1;
    } else if is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '.' | '#' => {
                let marker = chars[*pos];
                *pos += 1;
                let name = read_ident(chars, pos);
                if name.is_empty() {
                    return Err(unexpected_at(source, chars, *pos));
                }
                if marker == '.' {
                    compound.classes.push(name);
                } else {
                    compound.attrs.push(AttrTest {
                        name: "id".into(),
                        op: AttrOp::Equals,
                        value: name,
                    });
                }
            }
            '[' => compound.attrs.push(parse_attr(source, chars, pos)?),
            c if c.is_whitespace() || c == ',' => break,
            other => return Err(SelectorError::unexpected(source, *pos, other)),
        }
    }

    if *pos == start {
        return Err(unexpected_at(source, chars, *pos));
    }
    Ok(compound)
}

fn parse_attr(source: &str, chars: &[char], pos: &mut usize) -> Result<AttrTest, SelectorError> {
    *pos += 1; // '['
    skip_whitespace(chars, pos);
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err(unexpected_at(source, chars, *pos));
    }
    skip_whitespace(chars, pos);

    let op = match chars.get(*pos) {
        None => return Err(SelectorError::unterminated(source)),
        Some(']') => {
            *pos += 1;
            return Ok(AttrTest {
                name,
                op: AttrOp::Exists,
                value: String::new(),
            });
        }
        Some('=') => {
            *pos += 1;
            AttrOp::Equals
        }
        Some(&c @ ('*' | '^' | '$' | '~')) => {
            if chars.get(*pos + 1) != Some(&'=') {
                return Err(unexpected_at(source, chars, *pos + 1));
            }
            *pos += 2;
            match c {
                '*' => AttrOp::Contains,
                '^' => AttrOp::Prefix,
                '$' => AttrOp::Suffix,
                _ => AttrOp::Word,
            }
        }
        Some(&other) => return Err(SelectorError::unexpected(source, *pos, other)),
    };

    skip_whitespace(chars, pos);
    let value = match chars.get(*pos) {
        None => return Err(SelectorError::unterminated(source)),
        Some(&quote @ ('"' | '\'')) => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err(SelectorError::unterminated(source));
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        Some(_) => read_ident(chars, pos),
    };

    skip_whitespace(chars, pos);
    match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            Ok(AttrTest { name, op, value })
        }
        _ => Err(unexpected_at(source, chars, *pos)),
    }
}

macro_rules! selector_registry {
    ($( $(#[$doc:meta])* $field:ident => $default:expr, )+) => {
        /// Every element pattern the extractors use, by name.
        #[derive(Debug, Clone)]
        pub struct SelectorRegistry {
            $( $(#[$doc])* pub $field: Selector, )+
        }

        impl SelectorRegistry {
            pub const NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            pub fn entries(&self) -> Vec<(&'static str, &Selector)> {
                vec![$((stringify!($field), &self.$field)),+]
            }

            fn slot_mut(&mut self, name: &str) -> Option<&mut Selector> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }

        impl Default for SelectorRegistry {
            fn default() -> Self {
                Self {
                    $( $field: Selector::parse($default).expect("built-in selector"), )+
                }
            }
        }
    };
}

selector_registry! {
    /// One rendered human turn.
    user_message => r#"[data-testid="user-message"]"#,
    /// The hover group wrapping a turn and its action buttons.
    message_group => ".group",
    message_button => "button",
    copy_button => r#"button[data-testid="action-bar-copy"]"#,
    edit_textarea => "textarea",
    conversation_title => r#"[data-testid="chat-title-button"] .truncate, button[data-testid="chat-title-button"] div.truncate"#,
    artifact_container => r#"[data-testid="artifact"], [class*="artifact"], [class*="Artifact"]"#,
    artifact_code => "code, pre",
    artifact_title => r#"[class*="title"]"#,
    code_block => "pre code",
    attachment_container => r#"[class*="attachment"], [class*="file"], [class*="upload"]"#,
    attachment_filename => r#"[class*="filename"]"#,
    attachment_content => r#"pre, code, [class*="content"]"#,
    document_viewer => r#"[class*="document"], [class*="text-content"]"#,
    filename_holder => "[data-filename]",
    text_block => r#"pre, code, textarea, [class*="prose"], [role="textbox"]"#,
    response_container => r#"[class*="claude-message"]"#,
    user_container => r#"[class*="user-message"]"#,
    upload_container => r#"[class*="upload"]"#,
    /// Images served by the host or belonging to an artifact.
    image => r#"img[src*="claude"], img[src*="artifact"]"#,
}

impl SelectorRegistry {
    /// Default registry with named entries replaced.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, SelectorError> {
        let mut registry = Self::default();
        for (name, source) in overrides {
            let parsed = Selector::parse(source)?;
            let slot = registry
                .slot_mut(name)
                .ok_or_else(|| SelectorError::UnknownEntry(name.clone()))?;
            *slot = parsed;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat tree: (tag, attrs, parent)
    struct Tree(Vec<(&'static str, Vec<(&'static str, &'static str)>, Option<usize>)>);

    impl SelectorTarget for Tree {
        type Node = usize;

        fn tag(&self, node: usize) -> &str {
            self.0[node].0
        }

        fn attr(&self, node: usize, name: &str) -> Option<&str> {
            self.0[node]
                .1
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| *v)
        }

        fn parent(&self, node: usize) -> Option<usize> {
            self.0[node].2
        }
    }

    fn sample() -> Tree {
        Tree(vec![
            ("body", vec![], None),
            ("button", vec![("data-testid", "chat-title-button")], Some(0)),
            ("div", vec![("class", "truncate font-bold")], Some(1)),
            ("div", vec![("class", "my-Artifact-panel")], Some(0)),
            ("img", vec![("src", "https://claude.ai/x.png")], Some(0)),
        ])
    }

    #[test]
    fn parses_and_matches_descendant_lists() {
        let tree = sample();
        let registry = SelectorRegistry::default();
        assert!(registry.conversation_title.matches(&tree, 2));
        assert!(!registry.conversation_title.matches(&tree, 1));
        assert!(registry.artifact_container.matches(&tree, 3));
        assert!(registry.image.matches(&tree, 4));
        assert!(!registry.image.matches(&tree, 3));
    }

    #[test]
    fn attribute_operators() {
        let tree = sample();
        let cases = [
            ("[data-testid]", 1, true),
            ("[data-testid=chat-title-button]", 1, true),
            ("[data-testid^='chat']", 1, true),
            ("[data-testid$=\"button\"]", 1, true),
            ("[class~=truncate]", 2, true),
            ("[class~=trunc]", 2, false),
            ("[class*=\"\"]", 2, false),
            ("div.truncate.font-bold", 2, true),
            ("*", 4, true),
        ];
        for (source, node, expected) in cases {
            let selector = Selector::parse(source).unwrap();
            assert_eq!(selector.matches(&tree, node), expected, "{source}");
        }
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("div > p"),
            Err(SelectorError::Unexpected { found: '>', position: 4, .. })
        ));
        assert!(matches!(
            Selector::parse("[data-x=\"open"),
            Err(SelectorError::Unterminated { .. })
        ));
        assert!(matches!(
            Selector::parse("pre,"),
            Err(SelectorError::Unexpected { found: ',', .. })
        ));
        assert!(Selector::parse("a:hover").is_err());
    }

    #[test]
    fn overrides_replace_named_entries() {
        let mut overrides = BTreeMap::new();
        overrides.insert("copy_button".to_string(), "button.copy".to_string());
        let registry = SelectorRegistry::with_overrides(&overrides).unwrap();
        assert_eq!(registry.copy_button.as_str(), "button.copy");

        overrides.insert("no_such_entry".to_string(), "div".to_string());
        assert_eq!(
            SelectorRegistry::with_overrides(&overrides).unwrap_err(),
            SelectorError::UnknownEntry("no_such_entry".into())
        );
    }

    #[test]
    fn names_cover_every_entry() {
        let registry = SelectorRegistry::default();
        assert_eq!(registry.entries().len(), SelectorRegistry::NAMES.len());
    }
}
