//! wpfeed Client - HTTP access to WordPress sites
//!
//! This crate provides:
//!
//! - [`fetcher`] - paginated REST listing fetcher with retry
//! - [`session`] - login capabilities injected into the fetcher
//! - [`wordpress`] - decoding of REST records into feed items
//!
//! # Overview
//!
//! [`PageFetcher`] implements [`wpfeed_core::PageSource`]: it requests one
//! page per call, decodes records one by one, and reports the end of the
//! listing through `has_more` rather than as an error.

pub mod fetcher;
pub mod session;
pub mod wordpress;

// Re-export main client types
pub use fetcher::PageFetcher;
pub use session::{Anonymous, ApplicationPassword, SessionProvider, WordPressSession};
