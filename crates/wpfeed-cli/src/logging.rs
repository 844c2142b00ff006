//! Global tracing subscriber setup.
//!
//! Logs go to a file (or stderr) so stdout carries only the run summary.

use anyhow::Context;
use clap::ValueEnum;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(alias = "critical")]
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Keeps the log file open for the life of the process and syncs it on drop.
#[must_use = "dropping the guard early loses buffered log lines"]
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = file.sync_all();
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides `level`.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(level: LogLevel, target: &LogTarget) -> anyhow::Result<LogGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let (writer, file, ansi) = match target {
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), None, true),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let file = Arc::new(file);
            (BoxMakeWriter::new(file.clone()), Some(file), false)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(LogGuard { file })
}
