//! Loading of a previously written feed file.

use feed_rs::parser;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};
use wpfeed_core::error::AppError;
use wpfeed_core::models::{FeedItem, FeedSnapshot};

/// Parses RSS or Atom bytes into feed items, in document order.
///
/// Entries without any timestamp are skipped: they cannot be ordered.
///
/// # Errors
///
/// Returns `AppError::ParseError` if the document is not a feed.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>, AppError> {
    let feed = parser::parse(bytes).map_err(|e| AppError::ParseError(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let Some(updated) = entry.updated.or(entry.published) else {
                debug!(id = %entry.id, "Skipping feed entry without a date");
                return None;
            };
            let body = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .unwrap_or_default();

            Some(FeedItem {
                id: entry.id.trim().to_string(),
                updated_at: updated.timestamp(),
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                body,
            })
        })
        .filter(|item| !item.id.is_empty())
        .collect();

    Ok(items)
}

/// Loads the feed at `path`. Never fails: a missing file (first run) or an
/// unreadable one yields an empty snapshot.
///
/// Items are re-sorted newest-first and duplicate ids keep their first
/// occurrence.
pub async fn load_snapshot(path: &Path) -> FeedSnapshot {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No existing feed, starting empty");
            return FeedSnapshot::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read existing feed, starting empty");
            return FeedSnapshot::new();
        }
    };

    match parse_feed(&bytes) {
        Ok(items) => FeedSnapshot::normalized(items),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot parse existing feed, starting empty");
            FeedSnapshot::new()
        }
    }
}
