//! Domain types shared by the fetcher, the merge engine and the feed store.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// One entry of the synchronized feed.
///
/// Identity is `id` alone. `updated_at` only tells which of two copies of the
/// same entry is fresher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Opaque remote identifier, stable across API pages.
    pub id: String,
    /// Last modification time in epoch seconds.
    pub updated_at: i64,
    pub title: String,
    pub link: String,
    pub body: String,
}

impl FeedItem {
    /// Returns true if `term` occurs in the title or body, ignoring case.
    ///
    /// An empty term matches every item.
    ///
    /// # Examples
    ///
    /// ```
    /// use wpfeed_core::FeedItem;
    ///
    /// let item = FeedItem {
    ///     id: "7".to_string(),
    ///     updated_at: 0,
    ///     title: "Chapter 12".to_string(),
    ///     link: String::new(),
    ///     body: "Early access on Patreon".to_string(),
    /// };
    /// assert!(item.matches("patreon"));
    /// assert!(item.matches(""));
    /// assert!(!item.matches("kickstarter"));
    /// ```
    pub fn matches(&self, term: &str) -> bool {
        if term.is_empty() {
            return true;
        }
        let needle = term.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.body.to_lowercase().contains(&needle)
    }

    /// `updated_at` as a UTC datetime, if it is in chrono's range.
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.updated_at, 0).single()
    }
}

/// Ordered, newest-first list of feed items with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    items: Vec<FeedItem>,
}

impl FeedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps items that are already ordered and deduplicated.
    pub fn from_items(items: Vec<FeedItem>) -> Self {
        Self { items }
    }

    /// Builds a snapshot from items of unknown order: keeps the first
    /// occurrence of each id, then sorts newest-first (stable).
    pub fn normalized(items: Vec<FeedItem>) -> Self {
        let mut seen = HashSet::with_capacity(items.len());
        let mut items: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Self { items }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_newest_first(&self) -> bool {
        self.items
            .windows(2)
            .all(|pair| pair[0].updated_at >= pair[1].updated_at)
    }

    pub fn has_unique_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.items.len());
        self.items.iter().all(|item| seen.insert(item.id.as_str()))
    }
}

/// Syndication format of the written feed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedType {
    #[default]
    Rss,
    Atom,
}

impl FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rss" => Ok(FeedType::Rss),
            "atom" => Ok(FeedType::Atom),
            other => Err(format!("unknown feed type '{}', expected rss or atom", other)),
        }
    }
}

impl fmt::Display for FeedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedType::Rss => write!(f, "rss"),
            FeedType::Atom => write!(f, "atom"),
        }
    }
}

/// Position of a pagination walk.
///
/// `page` is 1-based and moves forward by exactly one per fetch attempt, a
/// failed page included. The walk stops once `pages_walked` reaches
/// `max_pages`, whatever the remote still has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page: u32,
    pub page_size: u32,
    pub pages_walked: u32,
    pub max_pages: u32,
}

impl Cursor {
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        Self {
            page: 1,
            page_size,
            pages_walked: 0,
            max_pages,
        }
    }

    /// Moves past the current page.
    pub fn advance(&mut self) {
        self.page += 1;
        self.pages_walked += 1;
    }

    /// True once the page budget is spent.
    pub fn exhausted(&self) -> bool {
        self.pages_walked >= self.max_pages
    }
}

/// A raw record the fetcher could not turn into a [`FeedItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Remote id, when the record had a usable one.
    pub id: Option<String>,
    pub cause: String,
}

/// One page of decoded API results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<FeedItem>,
    pub rejected: Vec<ItemFailure>,
    /// False once the remote side has no further pages.
    pub has_more: bool,
}

impl Page {
    /// The page past the end of the remote listing.
    pub fn exhausted() -> Self {
        Self {
            items: Vec::new(),
            rejected: Vec::new(),
            has_more: false,
        }
    }
}
