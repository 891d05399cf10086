//! Terminal renderings of the export status overlay
//!
//! # Quiet Mode
//!
//! Spinners are automatically suppressed when:
//! - `--quiet` flag is passed
//! - `TRANSCRIPTCTL_QUIET=1` environment variable is set
//! - stderr is not a TTY (piped output)

use std::cell::RefCell;
use std::io::{IsTerminal, Write};
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use transcriptctl_core::{Overlay, StatusUpdate, Tone};

/// Global quiet mode state
static QUIET_MODE: OnceLock<bool> = OnceLock::new();

/// Initialize quiet mode from flags and environment
///
/// Call this once at startup with the --quiet flag value.
pub fn init_quiet_mode(quiet_flag: bool) {
    let is_quiet = quiet_flag
        || std::env::var("TRANSCRIPTCTL_QUIET").map(|v| v == "1").unwrap_or(false)
        || !std::io::stderr().is_terminal();

    QUIET_MODE.set(is_quiet).ok();
}

/// Check if we're in quiet mode
pub fn is_quiet() -> bool {
    *QUIET_MODE.get().unwrap_or(&false)
}

/// Create a spinner that respects quiet mode
pub fn spinner(msg: impl Into<String>) -> Option<ProgressBar> {
    if is_quiet() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    Some(pb)
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: Option<ProgressBar>, msg: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .expect("valid template"),
        );
        pb.finish_with_message(format!("✓ {}", msg.into()));
    }
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: Option<ProgressBar>, msg: impl Into<String>) {
    if let Some(pb) = pb {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .expect("valid template"),
        );
        pb.finish_with_message(format!("✗ {}", msg.into()));
    }
}

/// Overlay drawn as a spinner on stderr.
#[derive(Default)]
pub struct SpinnerOverlay {
    bar: RefCell<Option<ProgressBar>>,
}

impl SpinnerOverlay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Overlay for SpinnerOverlay {
    fn show(&self, update: &StatusUpdate) {
        let mut bar = self.bar.borrow_mut();
        match update.class_name {
            Tone::Exporting => match bar.as_ref() {
                Some(pb) => pb.set_message(update.line()),
                None => *bar = spinner(update.line()),
            },
            Tone::Success => finish_success(bar.take(), &update.text),
            Tone::Error => finish_error(bar.take(), &update.text),
        }
    }

    fn remove(&self) {
        if let Some(pb) = self.bar.borrow_mut().take() {
            pb.finish_and_clear();
        }
    }
}

/// Overlay that prints every status update as a JSON line on stdout.
#[derive(Debug, Default)]
pub struct JsonOverlay;

impl Overlay for JsonOverlay {
    fn show(&self, update: &StatusUpdate) {
        if let Ok(line) = serde_json::to_string(update) {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", line).ok();
            out.flush().ok();
        }
    }

    fn remove(&self) {}
}
