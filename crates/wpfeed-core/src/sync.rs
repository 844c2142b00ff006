//! Outcome and report types for feed synchronization.
//!
//! These are plain data: the merge engine fills [`MergeStats`], the sync
//! runner produces a [`SyncReport`] per site, and the multi-site driver
//! aggregates everything into a [`BatchSyncSummary`].

use std::fmt;
use std::path::PathBuf;

/// Outcome of merging a single incoming item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Id not seen before - item added
    Created,
    /// Id known and incoming copy is newer - content replaced
    Updated,
    /// Id known and incoming copy is not newer - stored copy kept
    Unchanged,
    /// Item did not match the search term
    Filtered,
}

/// Counters for one merge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub filtered: usize,
    /// Items dropped by the age filter.
    pub expired: usize,
    /// Items cut by the `max_feed_items` bound.
    pub truncated: usize,
}

impl MergeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Created => self.created += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
            MergeOutcome::Filtered => self.filtered += 1,
        }
    }

    /// Returns the number of incoming items seen.
    pub fn incoming(&self) -> usize {
        self.created + self.updated + self.unchanged + self.filtered
    }

    /// Returns the number of incoming items that changed the feed.
    pub fn changed(&self) -> usize {
        self.created + self.updated
    }
}

/// What a recorded failure refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureTarget {
    Page(u32),
    Item { page: u32, id: Option<String> },
}

impl fmt::Display for FailureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureTarget::Page(page) => write!(f, "page {}", page),
            FailureTarget::Item { page, id: Some(id) } => write!(f, "item {} on page {}", id, page),
            FailureTarget::Item { page, id: None } => write!(f, "item without id on page {}", page),
        }
    }
}

/// A page or item that was skipped during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub target: FailureTarget,
    pub cause: String,
}

impl SyncFailure {
    pub fn page(page: u32, cause: impl Into<String>) -> Self {
        Self {
            target: FailureTarget::Page(page),
            cause: cause.into(),
        }
    }

    pub fn item(page: u32, id: Option<String>, cause: impl Into<String>) -> Self {
        Self {
            target: FailureTarget::Item { page, id },
            cause: cause.into(),
        }
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.cause)
    }
}

/// Result of one site's completed sync.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub site: String,
    pub output_path: PathBuf,
    /// Items in the written (or, on a dry run, computed) feed.
    pub items_written: usize,
    pub pages_walked: u32,
    pub stats: MergeStats,
    pub failures: Vec<SyncFailure>,
    /// The walk stopped on the per-site deadline.
    pub deadline_hit: bool,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn page_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| matches!(f.target, FailureTarget::Page(_)))
            .count()
    }

    pub fn item_failures(&self) -> usize {
        self.failures.len() - self.page_failures()
    }
}

/// Result of syncing a single site in a multi-site run.
#[derive(Debug, Clone)]
pub struct SiteSyncResult {
    /// Site name from the config file.
    pub site_name: String,
    /// Site URL, empty if the config never resolved.
    pub site_url: String,
    /// Report of a completed sync, None if the site failed.
    pub report: Option<SyncReport>,
    /// Error message if the site failed, None if successful.
    pub error: Option<String>,
}

impl SiteSyncResult {
    /// Creates a successful sync result.
    pub fn success(name: String, url: String, report: SyncReport) -> Self {
        Self {
            site_name: name,
            site_url: url,
            report: Some(report),
            error: None,
        }
    }

    /// Creates a failed sync result.
    pub fn failure(name: String, url: String, error: String) -> Self {
        Self {
            site_name: name,
            site_url: url,
            report: None,
            error: Some(error),
        }
    }

    /// Returns true if the sync was successful.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated results from syncing multiple sites.
#[derive(Debug, Clone, Default)]
pub struct BatchSyncSummary {
    /// Results for each site, in configuration order.
    pub results: Vec<SiteSyncResult>,
}

impl BatchSyncSummary {
    /// Creates a new empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a site sync result.
    pub fn add(&mut self, result: SiteSyncResult) {
        self.results.push(result);
    }

    /// Returns the count of successful syncs.
    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Returns the count of failed syncs.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Returns the total number of items written across successful sites.
    pub fn total_items(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.report.as_ref())
            .map(|r| r.items_written)
            .sum()
    }

    /// Returns the number of skipped pages and items across all sites.
    pub fn total_recorded_failures(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.report.as_ref())
            .map(|r| r.failures.len())
            .sum()
    }

    /// Returns the total number of sites processed.
    pub fn total_sites(&self) -> usize {
        self.results.len()
    }

    /// Process exit code: 0 when no site failed, 1 otherwise.
    ///
    /// Skipped pages and items inside a successful site do not count.
    pub fn exit_code(&self) -> i32 {
        if self.failed_count() == 0 {
            0
        } else {
            1
        }
    }
}
