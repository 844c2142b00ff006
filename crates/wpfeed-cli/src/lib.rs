//! wpfeed CLI - command-line front end for the feed sync engine
//!
//! This crate parses the command line, resolves per-site settings from the
//! config file and flags, installs logging, and renders the run summary.

pub mod config;
pub mod logging;
pub mod options;
pub mod summary;

pub use config::{site_jobs, Config, DEFAULT_SITE};
pub use logging::{LogGuard, LogLevel, LogTarget};
