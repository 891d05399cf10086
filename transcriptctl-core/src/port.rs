//! Host page ports.
//!
//! The extraction pipeline never touches a live DOM directly. Everything it
//! needs from the page (queries, synthetic events, client-side storage, the
//! clipboard primitive and the status overlay) goes through the traits in
//! this module, so the same pipeline runs against a browser binding or the
//! in-memory [`SnapshotPage`](crate::snapshot::SnapshotPage).

use std::fmt;

use crate::capture::CaptureSink;
use crate::error::PortError;
use crate::selectors::Selector;
use crate::status::StatusUpdate;

/// Opaque handle to an element of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Synthetic user interactions the pipeline dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    PointerEnter,
    PointerLeave,
    Click,
    EscapeKey,
    ScrollIntoView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Node(NodeId),
    Document,
}

/// Read and poke access to the rendered page.
///
/// All query methods return nodes in document order.
pub trait Page {
    fn query_all(&self, selector: &Selector) -> Vec<NodeId>;

    /// Descendants of `scope` (excluding `scope` itself) matching `selector`.
    fn query_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId>;

    /// `node` itself or its nearest ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId>;

    fn text_content(&self, node: NodeId) -> String;

    /// Current value of a form field, if the node has one.
    fn value(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn class_name(&self, node: NodeId) -> String {
        self.attribute(node, "class").unwrap_or_default()
    }

    /// False when the node (or an ancestor) is not laid out.
    fn is_rendered(&self, node: NodeId) -> bool;

    /// Position of the node in a preorder walk of the page.
    fn document_order(&self, node: NodeId) -> usize;

    /// Width and height, for images.
    fn dimensions(&self, node: NodeId) -> (u32, u32) {
        let read = |name: &str| {
            self.attribute(node, name)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(0)
        };
        (read("width"), read("height"))
    }

    fn dispatch(&self, target: EventTarget, event: PageEvent) -> Result<(), PortError>;
}

/// The page's client-side key-value storage.
pub trait ClientStorage {
    fn keys(&self) -> Vec<String>;
    fn get(&self, key: &str) -> Option<String>;
}

/// The clipboard-write primitive the page calls when it copies text.
pub trait ClipboardHook {
    /// Route every clipboard write to `sink` instead of the system clipboard.
    fn install(&self, sink: CaptureSink);
    /// Put the original primitive back.
    fn restore(&self);
}

/// On-page progress overlay.
pub trait Overlay {
    fn show(&self, update: &StatusUpdate);
    fn remove(&self);
}

/// The set of ports one export run works against.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub page: &'a dyn Page,
    pub storage: &'a dyn ClientStorage,
    pub clipboard: &'a dyn ClipboardHook,
    pub overlay: &'a dyn Overlay,
}

/// Overlay that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl Overlay for NoOverlay {
    fn show(&self, _update: &StatusUpdate) {}
    fn remove(&self) {}
}
