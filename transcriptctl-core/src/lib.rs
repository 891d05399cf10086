pub mod artifacts;
pub mod attachments;
pub mod capture;
pub mod config;
pub mod control;
pub mod document;
pub mod error;
pub mod heuristics;
pub mod messages;
pub mod model;
pub mod orchestrator;
pub mod port;
pub mod sanitize;
pub mod save;
pub mod selectors;
pub mod snapshot;
pub mod status;
pub mod storage;
pub mod textscan;

pub use capture::{CaptureChannel, CaptureGuard, CaptureSink, WaitOutcome};
pub use config::ExportConfig;
pub use control::{ControlMessage, Exporter};
pub use document::{build_document, DocumentMeta, ExportDocument};
pub use error::{ExportError, PortError, SelectorError};
pub use heuristics::{DefaultHeuristics, Heuristics};
pub use model::{
    Artifact, ArtifactKind, Attachment, AttachmentKind, AttachmentSource, ClaudeResponse,
    HumanMessage, Transcript,
};
pub use orchestrator::{ExportReport, ExportRun};
pub use port::{
    ClientStorage, ClipboardHook, EventTarget, Host, NoOverlay, NodeId, Overlay, Page, PageEvent,
};
pub use sanitize::{sanitize_filename, ConversationTitle};
pub use save::{DiskSaver, FileSaver, SaveOutcome, SaveRequest};
pub use selectors::{Selector, SelectorRegistry};
pub use snapshot::{ClickBehavior, PageSnapshot, SnapshotNode, SnapshotPage};
pub use status::{Progress, StatusUpdate, Tone};
