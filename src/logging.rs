//! Tracing setup and the bounded in-process event log
//!
//! The [`EventLog`] trait is the fire-and-forget log collaborator consumed by
//! the transport; [`BufferLog`] is the in-process implementation backing it
//! with a fixed-capacity ring of entries.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fire-and-forget log collaborator.
pub trait EventLog: Send + Sync {
    fn append(&self, level: LogLevel, message: &str, source: &str, category: &str);
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp_utc: String,
    pub level: &'static str,
    pub message: String,
    pub source: String,
    pub category: String,
}

/// Bounded in-process log buffer. Oldest entries are discarded once the
/// capacity is reached.
#[derive(Debug)]
pub struct BufferLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl BufferLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .expect("log buffer mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("log buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventLog for BufferLog {
    fn append(&self, level: LogLevel, message: &str, source: &str, category: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(source, category, "{message}"),
            LogLevel::Info => tracing::info!(source, category, "{message}"),
            LogLevel::Warn => tracing::warn!(source, category, "{message}"),
            LogLevel::Error => tracing::error!(source, category, "{message}"),
        }

        let entry = LogEntry {
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: level.as_str(),
            message: message.to_string(),
            source: source.to_string(),
            category: category.to_string(),
        };

        let mut entries = self.entries.lock().expect("log buffer mutex poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
