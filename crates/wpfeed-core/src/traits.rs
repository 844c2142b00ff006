use crate::config::SiteConfig;
use crate::error::AppError;
use crate::models::{Cursor, FeedSnapshot, Page};
use async_trait::async_trait;

/// Source of paginated remote items for one site.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Establishes whatever session the source needs before the first page.
    ///
    /// An error here ends the site's run.
    async fn prepare(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// Fetches the page the cursor points at. Must not mutate anything the
    /// cursor describes; the caller advances it.
    async fn fetch(&self, cursor: &Cursor) -> Result<Page, AppError>;
}

/// Persistence for a site's feed file.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Loads the previously written feed. Never fails: a missing or broken
    /// file yields an empty snapshot.
    async fn load(&self, site: &SiteConfig) -> FeedSnapshot;

    /// Replaces the feed file with `snapshot`, atomically.
    async fn save(&self, site: &SiteConfig, snapshot: &FeedSnapshot) -> Result<(), AppError>;
}
