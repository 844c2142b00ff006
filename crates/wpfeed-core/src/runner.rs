//! Per-site sync state machine.
//!
//! `Idle → Walking → Merging → Persisting → Done`, with `Failed` reachable
//! from session setup, from a fatal page error and from persisting. Pages
//! are fetched strictly in order. A failed page is recorded and skipped,
//! never retried here (the fetcher already retried transient errors).

use crate::config::{SiteConfig, SyncConfig};
use crate::error::AppError;
use crate::merge::{merge, MergePolicy};
use crate::models::{Cursor, FeedItem};
use crate::sync::{SyncFailure, SyncReport};
use crate::telemetry::Telemetry;
use crate::traits::{PageSource, SnapshotStore};
use chrono::Utc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Walking,
    Merging,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Default)]
struct Walk {
    items: Vec<FeedItem>,
    failures: Vec<SyncFailure>,
    pages_walked: u32,
    deadline_hit: bool,
}

/// Runs one site's sync from loading the old feed to writing the new one.
///
/// # Examples
///
/// ```no_run
/// use wpfeed_core::{SiteConfig, SyncConfig, SyncRunner, Telemetry};
/// # use wpfeed_core::{PageSource, SnapshotStore};
///
/// # async fn example(source: impl PageSource, store: impl SnapshotStore, site: SiteConfig) {
/// let settings = SyncConfig::default();
/// let telemetry = Telemetry::new();
/// let mut runner = SyncRunner::new(&site, &source, &store, &settings, &telemetry);
/// match runner.run().await {
///     Ok(report) => println!("{} items, {} skipped", report.items_written, report.failures.len()),
///     Err(e) => eprintln!("{}", e.user_message()),
/// }
/// # }
/// ```
pub struct SyncRunner<'a, S: ?Sized, St: ?Sized> {
    site: &'a SiteConfig,
    source: &'a S,
    store: &'a St,
    settings: &'a SyncConfig,
    telemetry: &'a Telemetry,
    state: SyncState,
}

impl<'a, S, St> SyncRunner<'a, S, St>
where
    S: PageSource + ?Sized,
    St: SnapshotStore + ?Sized,
{
    pub fn new(
        site: &'a SiteConfig,
        source: &'a S,
        store: &'a St,
        settings: &'a SyncConfig,
        telemetry: &'a Telemetry,
    ) -> Self {
        Self {
            site,
            source,
            store,
            settings,
            telemetry,
            state: SyncState::Idle,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Runs the sync with the current wall-clock time as the age reference.
    pub async fn run(&mut self) -> Result<SyncReport, AppError> {
        self.run_at(Utc::now().timestamp()).await
    }

    /// Runs the sync with `now` (epoch seconds) as the age reference.
    ///
    /// # Errors
    ///
    /// Returns the session error if [`PageSource::prepare`] fails, a fatal
    /// error raised by a page fetch (e.g. rejected credentials), or
    /// `AppError::PersistenceFailed` if the feed could not be written.
    pub async fn run_at(&mut self, now: i64) -> Result<SyncReport, AppError> {
        let span = self.telemetry.site_span(&self.site.name);
        let result = self.execute(now).instrument(span).await;
        if let Err(e) = &result {
            self.telemetry.site_failed(&self.site.name, e);
        }
        result
    }

    async fn execute(&mut self, now: i64) -> Result<SyncReport, AppError> {
        if let Err(e) = self.source.prepare().await {
            self.transition(SyncState::Failed);
            return Err(e);
        }

        let existing = self.store.load(self.site).await;
        debug!(items = existing.len(), path = %self.site.output_path.display(), "Loaded existing feed");

        self.transition(SyncState::Walking);
        let walk = match self.walk().await {
            Ok(walk) => walk,
            Err(e) => {
                self.transition(SyncState::Failed);
                return Err(e);
            }
        };

        self.transition(SyncState::Merging);
        let output = merge(&existing, &walk.items, &MergePolicy::from(self.site), now);

        let report = SyncReport {
            site: self.site.name.clone(),
            output_path: self.site.output_path.clone(),
            items_written: output.snapshot.len(),
            pages_walked: walk.pages_walked,
            stats: output.stats,
            failures: walk.failures,
            deadline_hit: walk.deadline_hit,
            dry_run: self.settings.dry_run,
        };

        if self.settings.dry_run {
            info!(items = report.items_written, "Dry run, feed file not written");
        } else {
            self.transition(SyncState::Persisting);
            if let Err(e) = self.store.save(self.site, &output.snapshot).await {
                let err = match e {
                    AppError::PersistenceFailed(_) => e,
                    other => AppError::PersistenceFailed(other.to_string()),
                };
                self.telemetry
                    .persistence_failed(&self.site.name, &self.site.output_path, &err);
                self.transition(SyncState::Failed);
                return Err(err);
            }
        }

        self.transition(SyncState::Done);
        self.telemetry.site_finished(&report);
        Ok(report)
    }

    async fn walk(&self) -> Result<Walk, AppError> {
        let mut cursor = Cursor::new(self.site.page_size, self.site.max_pages);
        let deadline = Instant::now() + self.settings.site_deadline;
        let mut walk = Walk::default();

        while !cursor.exhausted() {
            let page = cursor.page;

            let fetched = if Instant::now() >= deadline {
                None
            } else {
                timeout_at(deadline, self.source.fetch(&cursor)).await.ok()
            };
            let Some(fetched) = fetched else {
                warn!(
                    page,
                    pages_walked = cursor.pages_walked,
                    "Site deadline reached, finishing with the pages collected so far"
                );
                walk.deadline_hit = true;
                break;
            };

            cursor.advance();
            match fetched {
                Ok(result) => {
                    for rejected in result.rejected {
                        let failure = SyncFailure::item(page, rejected.id, rejected.cause);
                        self.telemetry.failure(&self.site.name, &failure);
                        walk.failures.push(failure);
                    }
                    debug!(page, items = result.items.len(), "Fetched page");
                    walk.items.extend(result.items);
                    if !result.has_more {
                        debug!(page, "Remote pagination exhausted");
                        break;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let failure = SyncFailure::page(page, e.to_string());
                    self.telemetry.failure(&self.site.name, &failure);
                    walk.failures.push(failure);
                }
            }
        }

        if cursor.exhausted() {
            debug!(max_pages = cursor.max_pages, "Page budget spent");
        }
        walk.pages_walked = cursor.pages_walked;
        Ok(walk)
    }

    fn transition(&mut self, next: SyncState) {
        debug!(from = ?self.state, to = ?next, "Sync state change");
        self.state = next;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{FeedSnapshot, ItemFailure, Page};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    pub(crate) const NOW: i64 = 1_700_000_000;

    pub(crate) fn item(id: &str, updated_at: i64) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            updated_at,
            title: format!("Title {id}"),
            link: format!("https://example.com/?page_id={id}"),
            body: format!("Body {id}"),
        }
    }

    pub(crate) fn site(name: &str) -> SiteConfig {
        let mut site = SiteConfig::defaults(name);
        site.site_url = format!("https://{name}.example.com");
        site.max_item_age_days = 0;
        site.output_path = format!("/feeds/{name}.xml").into();
        site
    }

    /// Serves canned pages; pages not in the map fail.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub pages: HashMap<u32, Page>,
        pub fail_prepare: bool,
        pub slow_page: Option<u32>,
        pub calls: AtomicU32,
    }

    impl FakeSource {
        pub(crate) fn with_pages(pages: Vec<Vec<FeedItem>>) -> Self {
            let total = pages.len() as u32;
            let pages = pages
                .into_iter()
                .enumerate()
                .map(|(i, items)| {
                    let number = i as u32 + 1;
                    (
                        number,
                        Page {
                            items,
                            rejected: Vec::new(),
                            has_more: number < total,
                        },
                    )
                })
                .collect();
            Self {
                pages,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl PageSource for FakeSource {
        async fn prepare(&self) -> Result<(), AppError> {
            if self.fail_prepare {
                return Err(AppError::AuthFailed("bad password".to_string()));
            }
            Ok(())
        }

        async fn fetch(&self, cursor: &Cursor) -> Result<Page, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_page == Some(cursor.page) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.pages
                .get(&cursor.page)
                .cloned()
                .ok_or(AppError::PageFetchFailed {
                    page: cursor.page,
                    cause: "HTTP 502".to_string(),
                })
        }
    }

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub files: Mutex<HashMap<String, FeedSnapshot>>,
        pub fail_save: bool,
    }

    impl MemoryStore {
        pub(crate) fn saved(&self, site: &str) -> Option<FeedSnapshot> {
            self.files.lock().unwrap().get(site).cloned()
        }
    }

    #[async_trait]
    impl SnapshotStore for MemoryStore {
        async fn load(&self, site: &SiteConfig) -> FeedSnapshot {
            self.saved(&site.name).unwrap_or_default()
        }

        async fn save(&self, site: &SiteConfig, snapshot: &FeedSnapshot) -> Result<(), AppError> {
            if self.fail_save {
                return Err(AppError::PersistenceFailed("read-only filesystem".to_string()));
            }
            self.files
                .lock()
                .unwrap()
                .insert(site.name.clone(), snapshot.clone());
            Ok(())
        }
    }

    async fn run(
        site: &SiteConfig,
        source: &FakeSource,
        store: &MemoryStore,
        settings: &SyncConfig,
    ) -> (Result<SyncReport, AppError>, SyncState) {
        let telemetry = Telemetry::new();
        let mut runner = SyncRunner::new(site, source, store, settings, &telemetry);
        let result = runner.run_at(NOW).await;
        (result, runner.state())
    }

    #[tokio::test]
    async fn test_walks_all_pages_and_persists() {
        let site = site("blog");
        let source = FakeSource::with_pages(vec![
            vec![item("1", 500), item("2", 400)],
            vec![item("3", 300)],
        ]);
        let store = MemoryStore::default();

        let (result, state) = run(&site, &source, &store, &SyncConfig::default()).await;
        let report = result.unwrap();

        assert_eq!(state, SyncState::Done);
        assert_eq!(report.pages_walked, 2);
        assert_eq!(report.items_written, 3);
        assert!(report.failures.is_empty());
        let saved = store.saved("blog").unwrap();
        let ids: Vec<_> = saved.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped() {
        let site = site("blog");
        let mut source = FakeSource::with_pages(vec![
            vec![item("1", 900)],
            vec![item("2", 800)],
            vec![item("3", 700)],
            vec![item("4", 600)],
            vec![item("5", 500)],
        ]);
        source.pages.remove(&2);
        let store = MemoryStore::default();

        let (result, state) = run(&site, &source, &store, &SyncConfig::default()).await;
        let report = result.unwrap();

        assert_eq!(state, SyncState::Done);
        assert_eq!(report.pages_walked, 5);
        assert_eq!(report.failures, vec![SyncFailure::page(2, "Failed to fetch page 2: HTTP 502")]);
        let saved = store.saved("blog").unwrap();
        let ids: Vec<_> = saved.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3", "4", "5"]);
    }

    #[tokio::test]
    async fn test_rejected_items_are_reported() {
        let site = site("blog");
        let mut source = FakeSource::with_pages(vec![vec![item("1", 10)]]);
        if let Some(page) = source.pages.get_mut(&1) {
            page.rejected.push(ItemFailure {
                id: Some("2".to_string()),
                cause: "missing modified_gmt".to_string(),
            });
        }
        let store = MemoryStore::default();

        let (result, _) = run(&site, &source, &store, &SyncConfig::default()).await;
        let report = result.unwrap();

        assert_eq!(report.items_written, 1);
        assert_eq!(
            report.failures,
            vec![SyncFailure::item(1, Some("2".to_string()), "missing modified_gmt")]
        );
    }

    #[tokio::test]
    async fn test_stops_at_max_pages() {
        let mut site = site("blog");
        site.max_pages = 2;
        let source = FakeSource::with_pages(vec![
            vec![item("1", 3)],
            vec![item("2", 2)],
            vec![item("3", 1)],
        ]);
        let store = MemoryStore::default();

        let (result, _) = run(&site, &source, &store, &SyncConfig::default()).await;
        let report = result.unwrap();

        assert_eq!(report.pages_walked, 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.items_written, 2);
    }

    #[tokio::test]
    async fn test_merges_with_existing_feed() {
        let site = site("blog");
        let store = MemoryStore::default();
        store.files.lock().unwrap().insert(
            "blog".to_string(),
            FeedSnapshot::from_items(vec![item("5", 100), item("old", 50)]),
        );
        let mut updated = item("5", 200);
        updated.title = "new".to_string();
        let source = FakeSource::with_pages(vec![vec![updated.clone()]]);

        let (result, _) = run(&site, &source, &store, &SyncConfig::default()).await;
        let report = result.unwrap();

        assert_eq!(report.stats.updated, 1);
        let saved = store.saved("blog").unwrap();
        assert_eq!(saved.items(), &[updated, item("old", 50)]);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let site = site("blog");
        let source = FakeSource::with_pages(vec![vec![item("1", 10)]]);
        let store = MemoryStore {
            fail_save: true,
            ..MemoryStore::default()
        };

        let (result, state) = run(&site, &source, &store, &SyncConfig::default()).await;

        assert!(matches!(result, Err(AppError::PersistenceFailed(_))));
        assert_eq!(state, SyncState::Failed);
        assert!(store.saved("blog").is_none());
    }

    #[tokio::test]
    async fn test_prepare_failure_ends_run_before_walking() {
        let site = site("blog");
        let source = FakeSource {
            fail_prepare: true,
            ..FakeSource::with_pages(vec![vec![item("1", 10)]])
        };
        let store = MemoryStore::default();

        let (result, state) = run(&site, &source, &store, &SyncConfig::default()).await;

        assert!(matches!(result, Err(AppError::AuthFailed(_))));
        assert_eq!(state, SyncState::Failed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dry_run_skips_persisting() {
        let site = site("blog");
        let source = FakeSource::with_pages(vec![vec![item("1", 10), item("2", 20)]]);
        let store = MemoryStore::default();
        let settings = SyncConfig {
            dry_run: true,
            ..SyncConfig::default()
        };

        let (result, state) = run(&site, &source, &store, &settings).await;
        let report = result.unwrap();

        assert_eq!(state, SyncState::Done);
        assert!(report.dry_run);
        assert_eq!(report.items_written, 2);
        assert!(store.saved("blog").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_finalizes_with_collected_pages() {
        let site = site("blog");
        let mut source = FakeSource::with_pages(vec![
            vec![item("1", 30)],
            vec![item("2", 20)],
            vec![item("3", 10)],
        ]);
        source.slow_page = Some(2);
        let store = MemoryStore::default();
        let settings = SyncConfig {
            site_deadline: Duration::from_secs(60),
            ..SyncConfig::default()
        };

        let (result, state) = run(&site, &source, &store, &settings).await;
        let report = result.unwrap();

        assert_eq!(state, SyncState::Done);
        assert!(report.deadline_hit);
        assert_eq!(report.pages_walked, 1);
        assert!(report.failures.is_empty());
        assert_eq!(store.saved("blog").map(|s| s.len()), Some(1));
    }
}
