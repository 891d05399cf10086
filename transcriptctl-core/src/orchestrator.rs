//! One export run, start to finish.
//!
//! Phases run strictly one after another on the caller's task: messages,
//! artifacts, attachments, then the copy controls that feed the capture
//! channel. The clipboard primitive and the overlay are restored by guards,
//! so every exit path leaves the page as it was found.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactExtractor;
use crate::attachments::AttachmentExtractor;
use crate::capture::{CaptureChannel, CaptureGuard, WaitOutcome};
use crate::config::ExportConfig;
use crate::document::{build_document, DocumentMeta};
use crate::error::{ExportError, Result};
use crate::heuristics::Heuristics;
use crate::messages::MessageExtractor;
use crate::model::Transcript;
use crate::port::{EventTarget, Host, PageEvent};
use crate::sanitize::ConversationTitle;
use crate::save::{FileSaver, SaveRequest};
use crate::selectors::SelectorRegistry;
use crate::status::{OverlayGuard, Progress, StatusReporter};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub filename: String,
    pub download_id: Option<u64>,
    pub progress: Progress,
}

pub struct ExportRun<'a> {
    host: Host<'a>,
    config: &'a ExportConfig,
    selectors: &'a SelectorRegistry,
    heuristics: &'a dyn Heuristics,
    saver: &'a dyn FileSaver,
}

impl<'a> ExportRun<'a> {
    pub fn new(
        host: Host<'a>,
        config: &'a ExportConfig,
        selectors: &'a SelectorRegistry,
        heuristics: &'a dyn Heuristics,
        saver: &'a dyn FileSaver,
    ) -> Self {
        Self {
            host,
            config,
            selectors,
            heuristics,
            saver,
        }
    }

    /// Run the pipeline, report the outcome on the overlay, linger, then
    /// clean up.
    pub async fn execute(&self) -> Result<ExportReport> {
        let channel = CaptureChannel::new();
        let _capture = CaptureGuard::install(self.host.clipboard, channel.sink());
        let _overlay = OverlayGuard::new(self.host.overlay);
        let reporter = StatusReporter::new(self.host.overlay);

        reporter.phase("⏳", "Starting enhanced export...");
        let result = self.pipeline(&channel, &reporter).await;
        match &result {
            Ok(report) => reporter.success(&report.filename),
            Err(err) => reporter.failure(&err.status_text()),
        }

        tokio::time::sleep(self.config.delays.linger()).await;
        debug!("export run cleaned up");
        result
    }

    async fn pipeline(
        &self,
        channel: &CaptureChannel,
        reporter: &StatusReporter<'_>,
    ) -> Result<ExportReport> {
        let delays = &self.config.delays;
        let page = self.host.page;
        tokio::time::sleep(delays.start()).await;

        reporter.phase("📝", "Extracting human messages...");
        let messages = MessageExtractor::new(page, self.selectors, delays)
            .extract_all(reporter)
            .await;

        reporter.phase("🎨", "Extracting artifacts...");
        let artifacts =
            ArtifactExtractor::new(page, self.host.storage, self.selectors, self.heuristics)
                .extract();
        reporter.update(|p| p.artifacts = artifacts.len());
        tokio::time::sleep(delays.phase()).await;

        reporter.phase("📎", "Extracting attachments...");
        let attachments = AttachmentExtractor::new(
            page,
            self.host.storage,
            self.selectors,
            self.heuristics,
            &self.config.images,
        )
        .extract(&artifacts);
        reporter.update(|p| p.attachments = attachments.len());
        tokio::time::sleep(delays.phase()).await;

        reporter.phase("🤖", "Copying Claude responses...");
        let expected = self.click_copy_controls().await?;

        let outcome = channel
            .wait_for(expected, self.config.capture.wait_budget(), |n| {
                if n != reporter.progress().responses {
                    reporter.update(|p| p.responses = n);
                }
            })
            .await;
        match outcome {
            WaitOutcome::Complete { captured } => info!(captured, "all responses captured"),
            WaitOutcome::TimedOut { captured, expected } => {
                warn!(captured, expected, "timed out waiting for responses")
            }
        }
        channel.close();

        let transcript = Transcript {
            messages,
            responses: channel.responses(),
            artifacts,
            attachments,
        };
        reporter.update(|p| p.responses = transcript.responses.len());
        if transcript.is_empty() {
            return Err(ExportError::EmptyTranscript);
        }
        log_summary(&transcript);

        let title = page
            .query_all(&self.selectors.conversation_title)
            .first()
            .map(|&node| page.text_content(node));
        let meta = DocumentMeta {
            title: ConversationTitle::from_page_text(title.as_deref()),
            exported_at: Utc::now(),
        };
        let document = build_document(&transcript, &meta);

        let outcome = self
            .saver
            .save(SaveRequest::new(document.filename.clone(), document.markdown))
            .await;
        if !outcome.success {
            return Err(ExportError::save(
                outcome.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        info!(file = %document.filename, "export complete");
        Ok(ExportReport {
            filename: document.filename,
            download_id: outcome.download_id,
            progress: reporter.progress(),
        })
    }

    /// Click every copy control, returning how many there were.
    async fn click_copy_controls(&self) -> Result<usize> {
        let page = self.host.page;
        let controls = page.query_all(&self.selectors.copy_button);
        if controls.is_empty() {
            return Err(ExportError::NoCopyControls);
        }
        info!(count = controls.len(), "clicking copy controls");

        for (i, &control) in controls.iter().enumerate() {
            if page.is_rendered(control) {
                let clicked = page
                    .dispatch(EventTarget::Node(control), PageEvent::ScrollIntoView)
                    .and_then(|()| page.dispatch(EventTarget::Node(control), PageEvent::Click));
                match clicked {
                    Ok(()) => {
                        debug!(control = i + 1, total = controls.len(), "clicked copy control")
                    }
                    Err(err) => {
                        warn!(control = i + 1, error = %err, "failed to click copy control")
                    }
                }
            } else {
                debug!(control = i + 1, "copy control not rendered");
            }
            if i + 1 < controls.len() {
                tokio::time::sleep(self.config.delays.copy()).await;
            }
        }
        Ok(controls.len())
    }
}

fn log_summary(transcript: &Transcript) {
    info!(
        human = transcript.messages.len(),
        responses = transcript.responses.len(),
        artifacts = transcript.artifacts.len(),
        attachments = transcript.attachments.len(),
        with_content = transcript.attachments_with_content(),
        "export summary"
    );
    for artifact in &transcript.artifacts {
        debug!(
            title = %artifact.title,
            language = %artifact.language,
            chars = artifact.content.chars().count(),
            "artifact"
        );
    }
    for attachment in transcript.attachments.iter().filter(|a| a.has_content()) {
        debug!(filename = %attachment.filename, "attachment with content");
    }
}
