//! Entry point the UI collaborator drives.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::heuristics::{DefaultHeuristics, Heuristics};
use crate::orchestrator::{ExportReport, ExportRun};
use crate::port::Host;
use crate::save::FileSaver;
use crate::selectors::SelectorRegistry;

/// Messages accepted from the UI, e.g. `{"action":"start"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ControlMessage {
    #[serde(rename = "start", alias = "startExport")]
    Start,
}

/// Owns the run configuration and makes sure only one run is active.
pub struct Exporter {
    config: ExportConfig,
    selectors: SelectorRegistry,
    heuristics: Box<dyn Heuristics>,
    running: AtomicBool,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Result<Self> {
        let selectors = SelectorRegistry::with_overrides(&config.selectors)?;
        Ok(Self {
            config,
            selectors,
            heuristics: Box::new(DefaultHeuristics),
            running: AtomicBool::new(false),
        })
    }

    pub fn with_heuristics(mut self, heuristics: impl Heuristics + 'static) -> Self {
        self.heuristics = Box::new(heuristics);
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn selectors(&self) -> &SelectorRegistry {
        &self.selectors
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one export against `host`. Fails with
    /// [`ExportError::AlreadyRunning`] without touching the page when a run
    /// is in progress.
    pub async fn start(&self, host: Host<'_>, saver: &dyn FileSaver) -> Result<ExportReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        info!("export started");
        ExportRun::new(host, &self.config, &self.selectors, self.heuristics.as_ref(), saver)
            .execute()
            .await
    }

    pub async fn handle(
        &self,
        host: Host<'_>,
        saver: &dyn FileSaver,
        message: ControlMessage,
    ) -> Result<ExportReport> {
        match message {
            ControlMessage::Start => self.start(host, saver).await,
        }
    }
}

/// Holds the run flag; clears it when dropped.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("export requested while another is running");
            return Err(ExportError::AlreadyRunning);
        }
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_message_names() {
        let start: ControlMessage = serde_json::from_str(r#"{"action":"start"}"#).unwrap();
        let legacy: ControlMessage = serde_json::from_str(r#"{"action":"startExport"}"#).unwrap();
        assert_eq!(start, ControlMessage::Start);
        assert_eq!(legacy, ControlMessage::Start);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"action":"stop"}"#).is_err());
        assert_eq!(
            serde_json::to_string(&ControlMessage::Start).unwrap(),
            r#"{"action":"start"}"#
        );
    }

    #[test]
    fn run_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        {
            let _held = RunGuard::acquire(&flag).unwrap();
            assert!(matches!(
                RunGuard::acquire(&flag),
                Err(ExportError::AlreadyRunning)
            ));
        }
        assert!(RunGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn bad_selector_override_is_rejected() {
        let mut config = ExportConfig::default();
        config.selectors.insert("copy_button".into(), "".into());
        assert!(matches!(Exporter::new(config), Err(ExportError::Selector(_))));
    }
}
