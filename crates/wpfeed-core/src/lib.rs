//! wpfeed Core - Domain types, merge engine, and sync orchestration.

pub mod config;
pub mod driver;
pub mod error;
pub mod merge;
pub mod models;
pub mod runner;
pub mod sync;
pub mod telemetry;
pub mod traits;

pub use config::{
    default_config_path, default_output_file, default_output_path, expand_home,
    load_sites_config, ConfigKey, HttpConfig, SiteConfig, SiteOverrides, SiteSection, SitesFile,
    SyncConfig, DEFAULT_SITE,
};
pub use driver::{MultiSiteDriver, SiteJob};
pub use error::AppError;
pub use merge::{classify_incoming, merge, MergeOutput, MergePolicy};
pub use models::{Cursor, FeedItem, FeedSnapshot, FeedType, ItemFailure, Page};
pub use runner::{SyncRunner, SyncState};
pub use sync::{
    BatchSyncSummary, FailureTarget, MergeOutcome, MergeStats, SiteSyncResult, SyncFailure,
    SyncReport,
};
pub use telemetry::Telemetry;
pub use traits::{PageSource, SnapshotStore};
