//! Multi-site driver: runs every configured site, isolates their failures,
//! and bounds concurrency overall and per remote host.

use crate::config::{SiteConfig, SyncConfig};
use crate::error::AppError;
use crate::runner::SyncRunner;
use crate::sync::{BatchSyncSummary, SiteSyncResult};
use crate::telemetry::Telemetry;
use crate::traits::{PageSource, SnapshotStore};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// One configured site, resolved or not.
///
/// A site whose settings failed to resolve still gets a job so that its
/// failure shows up in the summary next to the others.
#[derive(Debug)]
pub struct SiteJob {
    pub name: String,
    pub config: Result<SiteConfig, AppError>,
}

impl SiteJob {
    pub fn new(name: impl Into<String>, config: Result<SiteConfig, AppError>) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

/// Fails every job whose feed file an earlier job already writes. Two sites
/// never share one file.
fn claim_outputs(jobs: Vec<SiteJob>) -> Vec<SiteJob> {
    let mut owners: HashMap<PathBuf, String> = HashMap::new();
    jobs.into_iter()
        .map(|mut job| {
            let conflict = match &job.config {
                Ok(site) => match owners.get(&site.output_path) {
                    Some(first) => Some(format!(
                        "feed_output {} is already written by site '{}'",
                        site.output_path.display(),
                        first
                    )),
                    None => {
                        owners.insert(site.output_path.clone(), site.name.clone());
                        None
                    }
                },
                Err(_) => None,
            };
            if let Some(reason) = conflict {
                job.config = Err(AppError::ConfigError(reason));
            }
            job
        })
        .collect()
}

/// Per-host semaphores, created on first use.
struct HostLimiter {
    limit: usize,
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl HostLimiter {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        let semaphore = {
            let mut hosts = self.hosts.lock().unwrap_or_else(|p| p.into_inner());
            hosts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
                .clone()
        };
        semaphore.acquire_owned().await.ok()
    }
}

pub struct MultiSiteDriver<'a, St: ?Sized> {
    store: &'a St,
    settings: &'a SyncConfig,
    telemetry: &'a Telemetry,
    hosts: HostLimiter,
}

impl<'a, St> MultiSiteDriver<'a, St>
where
    St: SnapshotStore + ?Sized,
{
    pub fn new(store: &'a St, settings: &'a SyncConfig, telemetry: &'a Telemetry) -> Self {
        Self {
            store,
            settings,
            telemetry,
            hosts: HostLimiter::new(settings.per_host_limit),
        }
    }

    /// Syncs every job and returns one result per job, in job order.
    ///
    /// `make_source` builds the page source for a resolved site; an error
    /// from it fails that site alone. A site whose output path is taken by an
    /// earlier job fails with `AppError::ConfigError`. No site's outcome
    /// affects another's.
    pub async fn run<S, F>(&self, jobs: Vec<SiteJob>, make_source: F) -> BatchSyncSummary
    where
        S: PageSource,
        F: Fn(&SiteConfig) -> Result<S, AppError>,
    {
        let total = jobs.len();
        let concurrency = self.settings.concurrency.max(1);
        info!(
            run = %self.telemetry.run_id(),
            sites = total,
            concurrency,
            per_host = self.settings.per_host_limit,
            "Starting sync"
        );

        let make_source = &make_source;
        let jobs = claim_outputs(jobs);
        let mut results: Vec<(usize, SiteSyncResult)> = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move { (index, self.run_job(job, make_source).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut summary = BatchSyncSummary::new();
        for (_, result) in results {
            summary.add(result);
        }

        info!(
            successful = summary.successful_count(),
            failed = summary.failed_count(),
            items = summary.total_items(),
            skipped = summary.total_recorded_failures(),
            "Sync complete: {} of {} sites succeeded",
            summary.successful_count(),
            total
        );
        summary
    }

    async fn run_job<S, F>(&self, job: SiteJob, make_source: &F) -> SiteSyncResult
    where
        S: PageSource,
        F: Fn(&SiteConfig) -> Result<S, AppError>,
    {
        let site = match job.config {
            Ok(site) => site,
            Err(e) => {
                self.telemetry.site_failed(&job.name, &e);
                return SiteSyncResult::failure(job.name, String::new(), e.to_string());
            }
        };

        let source = match make_source(&site) {
            Ok(source) => source,
            Err(e) => {
                self.telemetry.site_failed(&site.name, &e);
                return SiteSyncResult::failure(site.name, site.site_url, e.to_string());
            }
        };

        let host = site.host();
        let _permit = self.hosts.acquire(&host).await;
        debug!(site = %site.name, host = %host, "Acquired host slot");

        let mut runner = SyncRunner::new(&site, &source, self.store, self.settings, self.telemetry);
        match runner.run().await {
            Ok(report) => SiteSyncResult::success(site.name.clone(), site.site_url.clone(), report),
            Err(e) => SiteSyncResult::failure(site.name.clone(), site.site_url.clone(), e.to_string()),
        }
    }
}
