//! Merge engine: folds freshly fetched items into the previous feed.
//!
//! [`merge`] is a pure function of its inputs. It never touches the existing
//! snapshot, so a failed sync can be retried against the same on-disk feed.

use crate::config::SiteConfig;
use crate::models::{FeedItem, FeedSnapshot};
use crate::sync::{MergeOutcome, MergeStats};
use std::collections::HashMap;

const SECONDS_PER_DAY: i64 = 86_400;

/// Filtering and bounding rules applied by [`merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    /// Case-insensitive substring required in title or body. Empty = all.
    pub search_term: String,
    /// 0 means unbounded.
    pub max_feed_items: usize,
    /// 0 disables the age filter.
    pub max_item_age_days: u32,
}

impl MergePolicy {
    /// Oldest `updated_at` that survives the age filter, if it is enabled.
    pub fn cutoff(&self, now: i64) -> Option<i64> {
        (self.max_item_age_days > 0)
            .then(|| now.saturating_sub(i64::from(self.max_item_age_days) * SECONDS_PER_DAY))
    }
}

impl From<&SiteConfig> for MergePolicy {
    fn from(site: &SiteConfig) -> Self {
        Self {
            search_term: site.search_term.clone(),
            max_feed_items: site.max_feed_items as usize,
            max_item_age_days: site.max_item_age_days,
        }
    }
}

/// Merged feed plus what happened to each incoming item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub snapshot: FeedSnapshot,
    pub stats: MergeStats,
}

/// Decides what an incoming copy of an item does to the stored one.
///
/// Strictly newer wins; equal or older is a no-op.
///
/// # Examples
///
/// ```
/// use wpfeed_core::{classify_incoming, FeedItem, MergeOutcome};
///
/// let item = |updated_at| FeedItem {
///     id: "5".to_string(),
///     updated_at,
///     title: String::new(),
///     link: String::new(),
///     body: String::new(),
/// };
/// assert_eq!(classify_incoming(None, &item(100)), MergeOutcome::Created);
/// assert_eq!(classify_incoming(Some(&item(100)), &item(200)), MergeOutcome::Updated);
/// assert_eq!(classify_incoming(Some(&item(200)), &item(100)), MergeOutcome::Unchanged);
/// ```
pub fn classify_incoming(stored: Option<&FeedItem>, incoming: &FeedItem) -> MergeOutcome {
    match stored {
        None => MergeOutcome::Created,
        Some(existing) if incoming.updated_at > existing.updated_at => MergeOutcome::Updated,
        Some(_) => MergeOutcome::Unchanged,
    }
}

/// Combines `existing` with `incoming` into a deduplicated, filtered,
/// newest-first, size-bounded snapshot.
///
/// 1. Existing items keep their snapshot order as insertion rank.
/// 2. Incoming items not matching the search term are discarded. Unknown ids
///    are appended; known ids are replaced in their slot when strictly newer.
/// 3. Items older than `now - max_item_age_days` are dropped.
/// 4. Survivors are stably sorted by `updated_at` descending.
/// 5. The result is cut to `max_feed_items` when bounded.
///
/// `now` is epoch seconds.
pub fn merge(
    existing: &FeedSnapshot,
    incoming: &[FeedItem],
    policy: &MergePolicy,
    now: i64,
) -> MergeOutput {
    let mut slots: Vec<FeedItem> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(slots.capacity());

    for item in existing.items() {
        if !index.contains_key(&item.id) {
            index.insert(item.id.clone(), slots.len());
            slots.push(item.clone());
        }
    }

    let mut stats = MergeStats::new();
    for item in incoming {
        if !item.matches(&policy.search_term) {
            stats.record(MergeOutcome::Filtered);
            continue;
        }

        let slot = index.get(&item.id).copied();
        let outcome = classify_incoming(slot.map(|s| &slots[s]), item);
        match (outcome, slot) {
            (MergeOutcome::Created, _) => {
                index.insert(item.id.clone(), slots.len());
                slots.push(item.clone());
            }
            (MergeOutcome::Updated, Some(s)) => slots[s] = item.clone(),
            _ => {}
        }
        stats.record(outcome);
    }

    if let Some(cutoff) = policy.cutoff(now) {
        let before = slots.len();
        slots.retain(|item| item.updated_at >= cutoff);
        stats.expired = before - slots.len();
    }

    // sort_by is stable: ties keep insertion rank
    slots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    if policy.max_feed_items > 0 && slots.len() > policy.max_feed_items {
        stats.truncated = slots.len() - policy.max_feed_items;
        slots.truncate(policy.max_feed_items);
    }

    MergeOutput {
        snapshot: FeedSnapshot::from_items(slots),
        stats,
    }
}
