//! wpfeed Store - the feed file as the sync state.
//!
//! The previously written RSS/Atom file is the only persistent state a site
//! has. [`FeedStore`] loads it (softly: a missing or broken file is an empty
//! feed) and replaces it atomically after a successful sync.

pub mod reader;
pub mod store;
pub mod writer;

pub use reader::{load_snapshot, parse_feed};
pub use store::{write_atomic, FeedStore};
pub use writer::{render, FeedMeta};
