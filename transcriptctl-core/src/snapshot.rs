//! In-memory page built from a JSON snapshot.
//!
//! A snapshot captures the parts of a rendered chat page the pipeline looks
//! at, plus the two interactive behaviours it drives: controls that open an
//! inline editor holding a message's raw text, and controls that copy a
//! response through the clipboard primitive.
//!
//! ```json
//! {
//!   "url": "https://claude.ai/chat/123",
//!   "body": {
//!     "tag": "body",
//!     "children": [
//!       {"tag": "div", "attrs": {"class": "group"}, "children": [
//!         {"tag": "div", "attrs": {"data-testid": "user-message"}, "text": "Hi"},
//!         {"tag": "button", "text": "Edit", "on_click": {"open_editor": {"text": "Hi"}}}
//!       ]}
//!     ]
//!   },
//!   "local_storage": {"conversation-1": "{}"}
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capture::CaptureSink;
use crate::error::PortError;
use crate::port::{ClientStorage, ClipboardHook, EventTarget, NodeId, Page, PageEvent};
use crate::selectors::{Selector, SelectorTarget};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    pub body: SnapshotNode,
    #[serde(default)]
    pub local_storage: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Text before the children, as in a DOM text node.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
    #[serde(default)]
    pub on_click: Option<ClickBehavior>,
}

fn default_tag() -> String {
    "div".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickBehavior {
    /// Opens the inline editor prefilled with `text`.
    OpenEditor { text: String },
    /// Writes `text` through the clipboard primitive.
    Copy { text: String },
}

impl SnapshotNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn class(self, class: impl Into<String>) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn on_click(mut self, behavior: ClickBehavior) -> Self {
        self.on_click = Some(behavior);
        self
    }

    pub fn child(mut self, child: SnapshotNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = SnapshotNode>) -> Self {
        self.children.extend(children);
        self
    }
}

struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: Option<String>,
    hidden: bool,
    on_click: Option<ClickBehavior>,
    parent: Option<usize>,
    children: Vec<usize>,
}

struct PageState {
    nodes: Vec<Node>,
    editor: Option<usize>,
    sink: Option<CaptureSink>,
    system_clipboard: Option<String>,
    events: Vec<(EventTarget, PageEvent)>,
}

const ROOT: usize = 0;

impl PageState {
    fn push(&mut self, snapshot: SnapshotNode, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            tag: snapshot.tag.to_ascii_lowercase(),
            attrs: snapshot.attrs,
            text: snapshot.text,
            value: snapshot.value,
            hidden: snapshot.hidden,
            on_click: snapshot.on_click,
            parent,
            children: Vec::new(),
        });
        for child in snapshot.children {
            let child_id = self.push(child, Some(id));
            self.nodes[id].children.push(child_id);
        }
        id
    }

    fn is_attached(&self, id: usize) -> bool {
        let mut current = id;
        loop {
            if current == ROOT {
                return true;
            }
            match self.nodes.get(current).and_then(|n| n.parent) {
                Some(parent) if self.nodes[parent].children.contains(&current) => current = parent,
                _ => return false,
            }
        }
    }

    /// Preorder walk below `from`, excluding `from`.
    fn descendants(&self, from: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.nodes[from].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    fn text_content(&self, id: usize) -> String {
        let mut text = self.nodes[id].text.clone();
        for &child in &self.nodes[id].children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    fn close_editor(&mut self) {
        if let Some(editor) = self.editor.take() {
            self.nodes[ROOT].children.retain(|&c| c != editor);
        }
    }

    fn open_editor(&mut self, text: String) {
        self.close_editor();
        let id = self.push(SnapshotNode::new("textarea").value(text), Some(ROOT));
        self.nodes[ROOT].children.push(id);
        self.editor = Some(id);
    }

    fn copy(&mut self, text: String) {
        match &self.sink {
            Some(sink) => {
                sink.write_text(&text);
            }
            None => self.system_clipboard = Some(text),
        }
    }
}

impl SelectorTarget for PageState {
    type Node = usize;

    fn tag(&self, node: usize) -> &str {
        &self.nodes[node].tag
    }

    fn attr(&self, node: usize, name: &str) -> Option<&str> {
        self.nodes[node].attrs.get(name).map(String::as_str)
    }

    fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }
}

/// A page, its storage and its clipboard, all in memory.
pub struct SnapshotPage {
    local_storage: BTreeMap<String, String>,
    state: Mutex<PageState>,
}

impl SnapshotPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        let mut state = PageState {
            nodes: Vec::new(),
            editor: None,
            sink: None,
            system_clipboard: None,
            events: Vec::new(),
        };
        state.push(snapshot.body, None);
        Self {
            local_storage: snapshot.local_storage,
            state: Mutex::new(state),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: PageSnapshot =
            serde_json::from_str(json).context("failed to parse page snapshot")?;
        debug!(
            url = snapshot.url.as_deref().unwrap_or("-"),
            keys = snapshot.local_storage.len(),
            "loaded page snapshot"
        );
        Ok(Self::new(snapshot))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    /// Text the page itself last put on the clipboard (writes not routed to
    /// a capture sink).
    pub fn system_clipboard(&self) -> Option<String> {
        self.lock().system_clipboard.clone()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().sink.is_some()
    }

    pub fn editor_open(&self) -> bool {
        self.lock().editor.is_some()
    }

    pub fn events(&self) -> Vec<(EventTarget, PageEvent)> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Page for SnapshotPage {
    fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        let state = self.lock();
        std::iter::once(ROOT)
            .chain(state.descendants(ROOT))
            .filter(|&id| selector.matches(&*state, id))
            .map(NodeId)
            .collect()
    }

    fn query_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let state = self.lock();
        if !state.is_attached(scope.0) {
            return Vec::new();
        }
        state
            .descendants(scope.0)
            .into_iter()
            .filter(|&id| selector.matches(&*state, id))
            .map(NodeId)
            .collect()
    }

    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let state = self.lock();
        let mut current = Some(node.0).filter(|&id| id < state.nodes.len());
        while let Some(id) = current {
            if selector.matches(&*state, id) {
                return Some(NodeId(id));
            }
            current = state.nodes[id].parent;
        }
        None
    }

    fn text_content(&self, node: NodeId) -> String {
        let state = self.lock();
        if node.0 >= state.nodes.len() {
            return String::new();
        }
        state.text_content(node.0)
    }

    fn value(&self, node: NodeId) -> Option<String> {
        self.lock().nodes.get(node.0).and_then(|n| n.value.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.lock()
            .nodes
            .get(node.0)
            .and_then(|n| n.attrs.get(name).cloned())
    }

    fn is_rendered(&self, node: NodeId) -> bool {
        let state = self.lock();
        if !state.is_attached(node.0) {
            return false;
        }
        let mut current = Some(node.0);
        while let Some(id) = current {
            if state.nodes[id].hidden {
                return false;
            }
            current = state.nodes[id].parent;
        }
        true
    }

    fn document_order(&self, node: NodeId) -> usize {
        let state = self.lock();
        if node.0 == ROOT {
            return 0;
        }
        state
            .descendants(ROOT)
            .iter()
            .position(|&id| id == node.0)
            .map(|p| p + 1)
            .unwrap_or(usize::MAX)
    }

    fn dispatch(&self, target: EventTarget, event: PageEvent) -> Result<(), PortError> {
        let mut state = self.lock();
        if let EventTarget::Node(node) = target {
            if !state.is_attached(node.0) {
                return Err(PortError::Detached(node));
            }
        }
        state.events.push((target, event));

        match (target, event) {
            (EventTarget::Node(node), PageEvent::Click) => {
                match state.nodes[node.0].on_click.clone() {
                    Some(ClickBehavior::OpenEditor { text }) => state.open_editor(text),
                    Some(ClickBehavior::Copy { text }) => state.copy(text),
                    None => {}
                }
            }
            (EventTarget::Document, PageEvent::EscapeKey) => state.close_editor(),
            _ => {}
        }
        Ok(())
    }
}

impl ClientStorage for SnapshotPage {
    fn keys(&self) -> Vec<String> {
        self.local_storage.keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<String> {
        self.local_storage.get(key).cloned()
    }
}

impl ClipboardHook for SnapshotPage {
    fn install(&self, sink: CaptureSink) {
        self.lock().sink = Some(sink);
    }

    fn restore(&self) {
        self.lock().sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureChannel;

    fn sel(source: &str) -> Selector {
        Selector::parse(source).unwrap()
    }

    fn page() -> SnapshotPage {
        let body = SnapshotNode::new("body").children([
            SnapshotNode::new("div").class("group").children([
                SnapshotNode::new("p").text("Hello "),
                SnapshotNode::new("span").text("world"),
                SnapshotNode::new("button")
                    .text("Edit")
                    .on_click(ClickBehavior::OpenEditor {
                        text: "Hello world".into(),
                    }),
            ]),
            SnapshotNode::new("div").hidden().child(
                SnapshotNode::new("button").on_click(ClickBehavior::Copy {
                    text: "copied response text, long enough".into(),
                }),
            ),
        ]);
        SnapshotPage::new(PageSnapshot {
            url: None,
            body,
            local_storage: BTreeMap::new(),
        })
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let page = page();
        let group = page.query_all(&sel(".group"))[0];
        assert_eq!(page.text_content(group), "Hello worldEdit");
    }

    #[test]
    fn editor_opens_and_closes() {
        let page = page();
        let edit = page.query_all(&sel("button"))[0];
        page.dispatch(EventTarget::Node(edit), PageEvent::Click).unwrap();
        let editors = page.query_all(&sel("textarea"));
        assert_eq!(editors.len(), 1);
        assert_eq!(page.value(editors[0]).as_deref(), Some("Hello world"));

        page.dispatch(EventTarget::Document, PageEvent::EscapeKey).unwrap();
        assert!(page.query_all(&sel("textarea")).is_empty());
        assert!(matches!(
            page.dispatch(EventTarget::Node(editors[0]), PageEvent::Click),
            Err(PortError::Detached(_))
        ));
    }

    #[test]
    fn copy_goes_to_sink_only_while_installed() {
        let page = page();
        let copy = page.query_all(&sel("button"))[1];
        assert!(!page.is_rendered(copy));

        let channel = CaptureChannel::new();
        page.install(channel.sink());
        page.dispatch(EventTarget::Node(copy), PageEvent::Click).unwrap();
        assert_eq!(channel.len(), 1);
        assert_eq!(page.system_clipboard(), None);

        page.restore();
        page.dispatch(EventTarget::Node(copy), PageEvent::Click).unwrap();
        assert_eq!(channel.len(), 1);
        assert!(page.system_clipboard().is_some());
    }

    #[test]
    fn document_order_follows_preorder() {
        let page = page();
        let buttons = page.query_all(&sel("button"));
        assert!(page.document_order(buttons[0]) < page.document_order(buttons[1]));
        assert_eq!(page.document_order(NodeId(0)), 0);
    }

    #[test]
    fn parses_json_snapshot() {
        let page = SnapshotPage::from_json(
            r#"{"url": "https://claude.ai/chat/1",
                "body": {"tag": "body", "children": [{"attrs": {"data-testid": "user-message"}, "text": "Hi"}]},
                "local_storage": {"chat": "{}"}}"#,
        )
        .unwrap();
        let found = page.query_all(&sel(r#"[data-testid="user-message"]"#));
        assert_eq!(found.len(), 1);
        assert_eq!(page.text_content(found[0]), "Hi");
        assert_eq!(page.keys(), vec!["chat".to_string()]);
    }
}
