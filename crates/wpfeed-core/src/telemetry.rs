//! Observability handle shared by the runner and the driver.
//!
//! The subscriber itself is installed once by the binary. This handle is
//! what library code receives explicitly: it tags every event with the run id
//! and counts the failures it reports, so nothing is dropped silently.

use crate::error::AppError;
use crate::sync::{FailureTarget, SyncFailure, SyncReport};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Telemetry {
    run_id: Uuid,
    failures: Arc<AtomicUsize>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of failures reported through this handle (and its clones).
    pub fn failures_reported(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Span wrapping everything done for one site.
    pub fn site_span(&self, site: &str) -> Span {
        info_span!("site", run = %self.run_id, site = site)
    }

    pub fn page_failed(&self, site: &str, page: u32, cause: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(site, page, error = cause, "Skipping page after fetch failure");
    }

    pub fn item_rejected(&self, site: &str, page: u32, id: Option<&str>, cause: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            site,
            page,
            id = id.unwrap_or("<none>"),
            error = cause,
            "Skipping item that could not be decoded"
        );
    }

    /// Records a failure already captured as a [`SyncFailure`].
    pub fn failure(&self, site: &str, failure: &SyncFailure) {
        match &failure.target {
            FailureTarget::Page(page) => self.page_failed(site, *page, &failure.cause),
            FailureTarget::Item { page, id } => {
                self.item_rejected(site, *page, id.as_deref(), &failure.cause)
            }
        }
    }

    pub fn persistence_failed(&self, site: &str, path: &Path, err: &AppError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(site, path = %path.display(), error = %err, "Feed not written, previous file kept");
    }

    pub fn site_failed(&self, site: &str, err: &AppError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        error!(site, error = %err, "Site sync failed");
    }

    pub fn site_finished(&self, report: &SyncReport) {
        info!(
            site = %report.site,
            items = report.items_written,
            pages = report.pages_walked,
            incoming = report.stats.incoming(),
            changed = report.stats.changed(),
            filtered = report.stats.filtered,
            expired = report.stats.expired,
            skipped_pages = report.page_failures(),
            skipped_items = report.item_failures(),
            dry_run = report.dry_run,
            "Site sync complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_counted_across_clones() {
        let telemetry = Telemetry::new();
        let clone = telemetry.clone();

        telemetry.page_failed("blog", 2, "HTTP 500");
        clone.item_rejected("blog", 3, Some("17"), "bad date");
        clone.failure("blog", &SyncFailure::item(4, None, "no id"));

        assert_eq!(telemetry.failures_reported(), 3);
        assert_eq!(telemetry.run_id(), clone.run_id());
    }

    #[test]
    fn test_distinct_runs_have_distinct_ids() {
        assert_ne!(Telemetry::new().run_id(), Telemetry::new().run_id());
    }
}
