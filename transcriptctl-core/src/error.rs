/// Structured error types for transcriptctl-core.
///
/// Library consumers get `thiserror` enums they can match on; the binary
/// wraps them in `anyhow` at the edges.
use thiserror::Error;

use crate::port::NodeId;

/// Errors that end an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A run was requested while another one is still in progress
    #[error("an export is already in progress")]
    AlreadyRunning,

    /// The page shows no "copy response" controls to drive
    #[error("No Claude copy buttons found!")]
    NoCopyControls,

    /// Neither human messages nor assistant responses were captured
    #[error("No messages captured!")]
    EmptyTranscript,

    /// The save collaborator rejected the document
    #[error("save failed: {reason}")]
    Save { reason: String },

    /// The host page refused an operation
    #[error("page error: {0}")]
    Port(#[from] PortError),

    /// A configured selector could not be parsed
    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
}

impl ExportError {
    pub fn save(reason: impl Into<String>) -> Self {
        Self::Save {
            reason: reason.into(),
        }
    }

    /// Short text for the status overlay.
    pub fn status_text(&self) -> String {
        match self {
            Self::NoCopyControls | Self::EmptyTranscript => self.to_string(),
            other => format!("Error: {other}"),
        }
    }
}

/// Failures reported by a host page port.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("node {0} is no longer attached to the page")]
    Detached(NodeId),

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Selector parse failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected {found:?} at position {position} in selector {selector:?}")]
    Unexpected {
        selector: String,
        position: usize,
        found: char,
    },

    #[error("unterminated attribute test in selector {selector:?}")]
    Unterminated { selector: String },

    #[error("unknown selector entry '{0}'")]
    UnknownEntry(String),
}

impl SelectorError {
    pub(crate) fn unexpected(selector: &str, position: usize, found: char) -> Self {
        Self::Unexpected {
            selector: selector.to_string(),
            position,
            found,
        }
    }

    pub(crate) fn unterminated(selector: &str) -> Self {
        Self::Unterminated {
            selector: selector.to_string(),
        }
    }
}

/// Result type alias for transcriptctl-core operations
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExportError::save("disk full");
        assert_eq!(err.to_string(), "save failed: disk full");

        let err = SelectorError::unexpected("a > b", 2, '>');
        assert!(err.to_string().contains("position 2"));
        assert!(err.to_string().contains("a > b"));
    }

    #[test]
    fn test_status_text() {
        assert_eq!(
            ExportError::EmptyTranscript.status_text(),
            "No messages captured!"
        );
        let err: ExportError = PortError::Detached(NodeId(3)).into();
        assert!(err.status_text().starts_with("Error: page error"));
    }
}
