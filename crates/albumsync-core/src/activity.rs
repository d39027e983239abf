//! Timestamped running log shown to the user during a browse/import session.
//!
//! Every entry is also forwarded to `tracing`, so the activity log and the
//! process log never disagree.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl ActivityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// A single log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: ActivityLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.at.with_timezone(&Local).format("%H:%M:%S"),
            self.level.label(),
            self.message
        )
    }
}

/// Bounded, thread-safe activity log. Oldest entries are dropped first.
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` entries, and always at least one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends an entry and mirrors it to `tracing` under the
    /// `albumsync::activity` target.
    pub fn record(&self, level: ActivityLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            ActivityLevel::Debug => tracing::debug!(target: "albumsync::activity", "{message}"),
            ActivityLevel::Info => tracing::info!(target: "albumsync::activity", "{message}"),
            ActivityLevel::Warn => tracing::warn!(target: "albumsync::activity", "{message}"),
            ActivityLevel::Error => tracing::error!(target: "albumsync::activity", "{message}"),
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            at: Utc::now(),
            level,
            message,
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(ActivityLevel::Error, message);
    }

    /// Snapshot of all retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    /// Entries at or above `level`.
    pub fn entries_at_least(&self, level: ActivityLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level >= level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }
}
