//! Recovers the raw text of every human turn.
//!
//! The rendered turn loses formatting, so each message is opened in the
//! page's inline editor and read back from the editor field:
//!
//! ```text
//! Idle -> Hovered -> Editing -> Read
//! ```
//!
//! Every turn ends the same way whether or not the read worked: Escape on
//! the document, a settle pause, then the pointer leaves the turn.

use tracing::{debug, info, warn};

use crate::config::DelayConfig;
use crate::model::HumanMessage;
use crate::port::{EventTarget, NodeId, Page, PageEvent};
use crate::selectors::SelectorRegistry;
use crate::status::StatusReporter;

/// Steps of one message's edit round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EditState {
    Idle,
    Hovered,
    Editing,
    Read(String),
}

pub struct MessageExtractor<'a> {
    page: &'a dyn Page,
    selectors: &'a SelectorRegistry,
    delays: &'a DelayConfig,
}

impl<'a> MessageExtractor<'a> {
    pub fn new(
        page: &'a dyn Page,
        selectors: &'a SelectorRegistry,
        delays: &'a DelayConfig,
    ) -> Self {
        Self {
            page,
            selectors,
            delays,
        }
    }

    /// One [`HumanMessage`] per rendered turn, in page order. Turns whose
    /// text could not be read keep an empty `content`.
    pub async fn extract_all(&self, reporter: &StatusReporter<'_>) -> Vec<HumanMessage> {
        let turns = self.page.query_all(&self.selectors.user_message);
        info!(count = turns.len(), "extracting human messages");

        let mut messages = Vec::with_capacity(turns.len());
        for (index, turn) in turns.into_iter().enumerate() {
            let content = self.extract_one(turn, index).await;
            messages.push(HumanMessage { index, content });
            reporter.update(|p| p.human = messages.len());
        }

        let recovered = messages.iter().filter(|m| m.is_recovered()).count();
        info!(total = messages.len(), recovered, "human messages extracted");
        messages
    }

    async fn extract_one(&self, turn: NodeId, index: usize) -> String {
        let mut state = EditState::Idle;
        let content = loop {
            state = match state {
                EditState::Idle => {
                    let hovered = self
                        .page
                        .dispatch(EventTarget::Node(turn), PageEvent::PointerEnter);
                    if let Err(err) = hovered {
                        warn!(message = index + 1, error = %err, "failed to hover message");
                        break String::new();
                    }
                    tokio::time::sleep(self.delays.hover()).await;
                    EditState::Hovered
                }
                EditState::Hovered => {
                    let Some(edit) = self.find_edit_control(turn) else {
                        warn!(message = index + 1, "no edit control for message");
                        break String::new();
                    };
                    debug!(message = index + 1, "extracting message via edit");
                    let clicked = self.page.dispatch(EventTarget::Node(edit), PageEvent::Click);
                    if let Err(err) = clicked {
                        warn!(message = index + 1, error = %err, "failed to open editor");
                        break String::new();
                    }
                    tokio::time::sleep(self.delays.edit()).await;
                    EditState::Editing
                }
                EditState::Editing => {
                    let text = self
                        .page
                        .query_all(&self.selectors.edit_textarea)
                        .first()
                        .and_then(|&field| self.page.value(field))
                        .unwrap_or_default();
                    EditState::Read(text)
                }
                EditState::Read(text) => break text,
            };
        };

        if content.is_empty() {
            warn!(message = index + 1, "failed to extract message");
        }
        if let Err(err) = self.page.dispatch(EventTarget::Document, PageEvent::EscapeKey) {
            warn!(message = index + 1, error = %err, "failed to dismiss editor");
        }
        tokio::time::sleep(self.delays.hover()).await;
        if let Err(err) = self.page.dispatch(EventTarget::Node(turn), PageEvent::PointerLeave) {
            debug!(message = index + 1, error = %err, "pointer leave not delivered");
        }
        content
    }

    /// The control labelled "edit" in the turn's group, else the group's
    /// second control.
    fn find_edit_control(&self, turn: NodeId) -> Option<NodeId> {
        let group = self.page.closest(turn, &self.selectors.message_group)?;
        let buttons = self.page.query_within(group, &self.selectors.message_button);
        let is_edit = |label: &str| label.trim().eq_ignore_ascii_case("edit");
        let labelled = buttons.iter().copied().find(|&b| {
            is_edit(&self.page.text_content(b))
                || self.page.attribute(b, "aria-label").is_some_and(|l| is_edit(&l))
        });
        labelled.or_else(|| buttons.get(1).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::NoOverlay;
    use crate::snapshot::{ClickBehavior, PageSnapshot, SnapshotNode, SnapshotPage};

    fn turn(text: &str, raw: Option<&str>, labelled: bool) -> SnapshotNode {
        let mut edit = SnapshotNode::new("button");
        if labelled {
            edit = edit.text("Edit");
        }
        if let Some(raw) = raw {
            edit = edit.on_click(ClickBehavior::OpenEditor { text: raw.into() });
        }
        SnapshotNode::new("div").class("group").children([
            SnapshotNode::new("div")
                .attr("data-testid", "user-message")
                .text(text),
            SnapshotNode::new("button").text("Retry"),
            edit,
        ])
    }

    fn page(turns: Vec<SnapshotNode>) -> SnapshotPage {
        SnapshotPage::new(PageSnapshot {
            body: SnapshotNode::new("body").children(turns),
            ..PageSnapshot::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn reads_raw_text_through_editor() {
        let page = page(vec![
            turn("rendered", Some("**raw** one"), true),
            turn("rendered", Some("raw two"), false),
        ]);
        let selectors = SelectorRegistry::default();
        let delays = DelayConfig::default();
        let reporter = StatusReporter::new(&NoOverlay);

        let messages = MessageExtractor::new(&page, &selectors, &delays)
            .extract_all(&reporter)
            .await;

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "**raw** one");
        assert_eq!(messages[1].content, "raw two");
        assert_eq!(reporter.progress().human, 2);
        assert!(!page.editor_open());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reads_keep_an_empty_slot_and_leave_the_turn() {
        let page = page(vec![turn("rendered", None, true)]);
        let selectors = SelectorRegistry::default();
        let delays = DelayConfig::default();
        let reporter = StatusReporter::new(&NoOverlay);

        let messages = MessageExtractor::new(&page, &selectors, &delays)
            .extract_all(&reporter)
            .await;

        assert_eq!(messages.len(), 1);
        assert!(!messages[0].is_recovered());
        let events = page.events();
        assert_eq!(events.first().map(|e| e.1), Some(PageEvent::PointerEnter));
        assert_eq!(events.last().map(|e| e.1), Some(PageEvent::PointerLeave));
    }

    #[tokio::test(start_paused = true)]
    async fn turn_without_controls_is_still_dismissed_before_leaving() {
        let page = page(vec![SnapshotNode::new("div").class("group").child(
            SnapshotNode::new("div")
                .attr("data-testid", "user-message")
                .text("rendered"),
        )]);
        let selectors = SelectorRegistry::default();
        let delays = DelayConfig::default();
        let reporter = StatusReporter::new(&NoOverlay);

        let messages = MessageExtractor::new(&page, &selectors, &delays)
            .extract_all(&reporter)
            .await;

        assert!(!messages[0].is_recovered());
        let events: Vec<PageEvent> = page.events().into_iter().map(|(_, e)| e).collect();
        assert_eq!(
            events,
            vec![PageEvent::PointerEnter, PageEvent::EscapeKey, PageEvent::PointerLeave]
        );
    }
}
