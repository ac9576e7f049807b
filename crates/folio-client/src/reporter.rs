//! Dwell-gated view reporting.
//!
//! A page view is only reported once the reader has stayed on the page for
//! the dwell delay. Leaving the page, or entering another one, before the
//! delay elapses cancels the pending report.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use folio_shared::constants::DWELL_DELAY_MS;
use folio_shared::types::Slug;

use crate::error::Result;
use crate::sink::ViewSink;

struct Pending {
    slug: Slug,
    handle: JoinHandle<()>,
}

pub struct ViewReporter<S: ViewSink + 'static> {
    sink: Arc<S>,
    dwell: Duration,
    pending: Mutex<Option<Pending>>,
}

impl<S: ViewSink + 'static> ViewReporter<S> {
    pub fn new(sink: S) -> Self {
        Self::with_dwell(sink, Duration::from_millis(DWELL_DELAY_MS))
    }

    pub fn with_dwell(sink: S, dwell: Duration) -> Self {
        Self {
            sink: Arc::new(sink),
            dwell,
            pending: Mutex::new(None),
        }
    }

    /// Start the dwell timer for `slug`. Any report still pending for the
    /// previous page is cancelled. Must be called inside a Tokio runtime.
    pub fn page_entered(&self, slug: &str, path: &str) -> Result<()> {
        let slug = Slug::parse(slug)?;

        let sink = self.sink.clone();
        let dwell = self.dwell;
        let task_slug = slug.clone();
        let path = path.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(dwell).await;
            if let Err(e) = sink.report_view(&task_slug, &path).await {
                warn!(slug = %task_slug, error = %e, "Failed to report view");
            }
        });

        if let Some(previous) = self.slot().replace(Pending { slug, handle }) {
            cancel(previous);
        }
        Ok(())
    }

    /// Cancel the pending report, if any.
    pub fn page_left(&self) {
        if let Some(previous) = self.slot().take() {
            cancel(previous);
        }
    }

    /// Slug whose report is still waiting on the dwell timer.
    pub fn pending_slug(&self) -> Option<Slug> {
        self.slot()
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.slug.clone())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Pending>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<S: ViewSink + 'static> Drop for ViewReporter<S> {
    fn drop(&mut self) {
        self.page_left();
    }
}

fn cancel(pending: Pending) {
    if !pending.handle.is_finished() {
        debug!(slug = %pending.slug, "Cancelled pending view report");
    }
    pending.handle.abort();
}
