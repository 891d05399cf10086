//! Live progress reporting for the on-page overlay and the popup UI.

use std::cell::Cell;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::port::Overlay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Exporting,
    Success,
    Error,
}

impl Tone {
    /// Overlay background colour.
    pub fn color(&self) -> &'static str {
        match self {
            Tone::Exporting => "#2196F3",
            Tone::Success => "#4CAF50",
            Tone::Error => "#f44336",
        }
    }
}

/// One status message, in the shape the popup collaborator renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "exportStatus", rename_all = "camelCase")]
pub struct StatusUpdate {
    pub icon: String,
    pub text: String,
    pub class_name: Tone,
}

impl StatusUpdate {
    pub fn new(icon: impl Into<String>, text: impl Into<String>, tone: Tone) -> Self {
        Self {
            icon: icon.into(),
            text: text.into(),
            class_name: tone,
        }
    }

    /// Icon and text as a single overlay line.
    pub fn line(&self) -> String {
        if self.icon.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.icon, self.text)
        }
    }
}

/// Running entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub human: usize,
    pub responses: usize,
    pub artifacts: usize,
    pub attachments: usize,
}

impl Progress {
    /// `Human: 2 | Claude: 1 | Artifacts: 3`; zero artifact/attachment
    /// counts are left out.
    pub fn status_line(&self) -> String {
        let mut parts = vec![
            format!("Human: {}", self.human),
            format!("Claude: {}", self.responses),
        ];
        if self.artifacts > 0 {
            parts.push(format!("Artifacts: {}", self.artifacts));
        }
        if self.attachments > 0 {
            parts.push(format!("Attachments: {}", self.attachments));
        }
        parts.join(" | ")
    }

    /// Completion banner shown after a successful save.
    pub fn summary_line(&self, filename: &str) -> String {
        let mut parts = vec![
            format!("Exported: {filename}"),
            format!("📝 {}msg", self.human),
            format!("🤖 {}resp", self.responses),
        ];
        if self.artifacts > 0 {
            parts.push(format!("🎨 {}art", self.artifacts));
        }
        if self.attachments > 0 {
            parts.push(format!("📎 {}att", self.attachments));
        }
        parts.join(" | ")
    }
}

/// Pushes phase and count updates to an [`Overlay`].
pub struct StatusReporter<'a> {
    overlay: &'a dyn Overlay,
    progress: Cell<Progress>,
}

impl<'a> StatusReporter<'a> {
    pub fn new(overlay: &'a dyn Overlay) -> Self {
        Self {
            overlay,
            progress: Cell::new(Progress::default()),
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    pub fn phase(&self, icon: &str, text: &str) {
        debug!(phase = text, "status");
        self.overlay
            .show(&StatusUpdate::new(icon, text, Tone::Exporting));
    }

    pub fn update(&self, apply: impl FnOnce(&mut Progress)) {
        let mut progress = self.progress.get();
        apply(&mut progress);
        self.progress.set(progress);
        self.overlay
            .show(&StatusUpdate::new("", progress.status_line(), Tone::Exporting));
    }

    pub fn success(&self, filename: &str) {
        let text = self.progress.get().summary_line(filename);
        info!("{}", text);
        self.overlay.show(&StatusUpdate::new("✅", text, Tone::Success));
    }

    pub fn failure(&self, text: &str) {
        error!("export failed: {}", text);
        self.overlay.show(&StatusUpdate::new("❌", text, Tone::Error));
    }
}

/// Removes the overlay when dropped.
pub struct OverlayGuard<'a> {
    overlay: &'a dyn Overlay,
}

impl<'a> OverlayGuard<'a> {
    pub fn new(overlay: &'a dyn Overlay) -> Self {
        Self { overlay }
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.overlay.remove();
    }
}
