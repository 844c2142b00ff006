//! Feed file persistence with atomic replace.
//!
//! A save never leaves a partially written feed at the output path: the
//! document is written to a uniquely named temporary file in the same
//! directory, synced to disk, and renamed over the destination.

use crate::reader::load_snapshot;
use crate::writer::{render, FeedMeta};
use async_trait::async_trait;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use wpfeed_core::config::SiteConfig;
use wpfeed_core::error::AppError;
use wpfeed_core::models::FeedSnapshot;
use wpfeed_core::traits::SnapshotStore;

/// [`SnapshotStore`] backed by the RSS/Atom file at each site's
/// `output_path`.
///
/// # Examples
///
/// ```no_run
/// use wpfeed_core::{SiteConfig, SnapshotStore};
/// use wpfeed_store::FeedStore;
///
/// # async fn example(site: SiteConfig) -> Result<(), wpfeed_core::AppError> {
/// let store = FeedStore::new();
/// let snapshot = store.load(&site).await;
/// store.save(&site, &snapshot).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedStore;

impl FeedStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SnapshotStore for FeedStore {
    async fn load(&self, site: &SiteConfig) -> FeedSnapshot {
        load_snapshot(&site.output_path).await
    }

    async fn save(&self, site: &SiteConfig, snapshot: &FeedSnapshot) -> Result<(), AppError> {
        let meta = FeedMeta::for_site(site, Utc::now());
        let bytes = render(snapshot, site.feed_type, &meta)?;
        let path = site.output_path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, |file| file.write_all(&bytes)))
            .await
            .map_err(|e| AppError::PersistenceFailed(format!("write task failed: {}", e)))??;

        info!(
            path = %site.output_path.display(),
            items = snapshot.len(),
            format = %site.feed_type,
            "Feed written"
        );
        Ok(())
    }
}

/// Temporary sibling of `path`, hidden and unique per call.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "feed".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Replaces `path` with whatever `write` puts into a fresh file.
///
/// On any error the temporary file is removed and `path` is untouched.
///
/// # Errors
///
/// Returns `AppError::PersistenceFailed` naming the step that failed.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), AppError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let temp_path = temp_path_for(path);
    let failed = |step: &str, e: io::Error| {
        let _ = fs::remove_file(&temp_path);
        AppError::PersistenceFailed(format!("{} '{}': {}", step, path.display(), e))
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| AppError::PersistenceFailed(format!(
            "cannot create temporary file '{}': {}",
            temp_path.display(),
            e
        )))?;

    write(&mut file).map_err(|e| failed("failed writing", e))?;
    file.sync_all().map_err(|e| failed("failed syncing", e))?;
    drop(file);

    // Windows refuses to rename over an existing file.
    #[cfg(windows)]
    if path.exists() {
        fs::remove_file(path).map_err(|e| failed("cannot replace", e))?;
    }

    fs::rename(&temp_path, path).map_err(|e| failed("cannot rename into", e))?;
    debug!(path = %path.display(), "Atomic replace complete");
    Ok(())
}
