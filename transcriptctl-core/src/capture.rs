//! Capture channel for assistant responses.
//!
//! The page copies each response through its clipboard primitive when a
//! "copy" control is clicked. During a run that primitive is routed to a
//! [`CaptureSink`]; the owning [`CaptureChannel`] collects the text and
//! publishes the running count on a `watch` channel so the orchestrator can
//! wait for completion without polling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::model::{ClaudeResponse, MIN_RESPONSE_CHARS};
use crate::port::ClipboardHook;

struct Shared {
    responses: Mutex<Vec<ClaudeResponse>>,
    count: watch::Sender<usize>,
    open: AtomicBool,
}

/// Owner side: holds the captured responses.
pub struct CaptureChannel {
    shared: Arc<Shared>,
}

/// Writer side handed to the clipboard hook.
#[derive(Clone)]
pub struct CaptureSink {
    shared: Arc<Shared>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Complete { captured: usize },
    TimedOut { captured: usize, expected: usize },
}

impl CaptureChannel {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                responses: Mutex::new(Vec::new()),
                count,
                open: AtomicBool::new(true),
            }),
        }
    }

    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn len(&self) -> usize {
        *self.shared.count.borrow()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.shared.count.subscribe()
    }

    /// Stop accepting new responses. Writes are still swallowed.
    pub fn close(&self) {
        self.shared.open.store(false, Ordering::SeqCst);
    }

    pub fn responses(&self) -> Vec<ClaudeResponse> {
        self.shared
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until at least `expected` responses were captured or `budget`
    /// runs out. `on_progress` sees every intermediate count.
    pub async fn wait_for(
        &self,
        expected: usize,
        budget: Duration,
        mut on_progress: impl FnMut(usize),
    ) -> WaitOutcome {
        let deadline = Instant::now() + budget;
        let mut rx = self.subscribe();
        loop {
            let captured = *rx.borrow_and_update();
            on_progress(captured);
            if captured >= expected {
                return WaitOutcome::Complete { captured };
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => {
                    let captured = *rx.borrow();
                    return WaitOutcome::TimedOut { captured, expected };
                }
            }
        }
    }
}

impl Default for CaptureChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSink {
    /// Replacement for the page's clipboard write. Returns true when the
    /// text was kept as a response.
    pub fn write_text(&self, text: &str) -> bool {
        if !self.shared.open.load(Ordering::SeqCst) {
            return false;
        }
        let chars = text.chars().count();
        if chars <= MIN_RESPONSE_CHARS {
            debug!(chars, "ignoring short clipboard write");
            return false;
        }

        let mut responses = self
            .shared
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        responses.push(ClaudeResponse {
            content: text.to_string(),
            timestamp: Utc::now(),
        });
        let total = responses.len();
        drop(responses);

        debug!(index = total, chars, "captured response");
        self.shared.count.send_replace(total);
        true
    }
}

/// Installs a sink on a clipboard hook and restores the hook when dropped.
pub struct CaptureGuard<'a> {
    hook: &'a dyn ClipboardHook,
}

impl<'a> CaptureGuard<'a> {
    pub fn install(hook: &'a dyn ClipboardHook, sink: CaptureSink) -> Self {
        hook.install(sink);
        Self { hook }
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.hook.restore();
        debug!("clipboard primitive restored");
    }
}
