//! Audit logging: a record of every tool execution and every refusal.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
    /// What the tool acted on (path, command, pattern)
    pub target: String,
    pub outcome: AuditOutcome,
    pub details: Option<String>,
}

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A tool ran to completion (successfully or not)
    ToolExecution { tool_name: String },
    /// A path argument escaped the confinement root
    PathDenied { tool_name: String },
    /// A shell command matched the denylist
    CommandBlocked { reason: String },
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

/// Where audit entries are written.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Entries kept in memory by default; older ones are dropped first.
pub const DEFAULT_RETAINED_ENTRIES: usize = 1000;

/// Keeps the most recent entries in memory and forwards each one to its sinks.
pub struct AuditLogger {
    entries: Mutex<VecDeque<AuditEntry>>,
    retain: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("entry_count", &self.count())
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLogger {
    /// Create a new audit logger with no sinks.
    pub fn new() -> Self {
        Self::with_sinks(Vec::new())
    }

    /// Create a new audit logger with the given sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn AuditSink>>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            retain: DEFAULT_RETAINED_ENTRIES,
            sinks,
        }
    }

    /// An audit logger that only forwards to `tracing` and keeps nothing in memory.
    pub fn tracing() -> Self {
        Self::with_sinks(vec![Box::new(TracingSink)]).with_retention(0)
    }

    /// Keep at most `retain` entries in memory.
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain;
        self
    }

    /// Record an audit event.
    pub fn log(&self, event: AuditEvent, target: &str, outcome: AuditOutcome, details: Option<String>) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            target: target.into(),
            outcome,
            details,
        };

        for sink in &self.sinks {
            sink.record(&entry);
        }
        if self.retain == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.retain {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Get all recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Get entries with the given outcome.
    pub fn entries_by_outcome(&self, outcome: &AuditOutcome) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| &e.outcome == outcome)
            .cloned()
            .collect()
    }

    /// Clear all stored entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Count of stored entries.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<AuditEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Logs entries via `tracing::info!`.
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn record(&self, entry: &AuditEntry) {
        tracing::info!(
            event = ?entry.event,
            target = %entry.target,
            outcome = ?entry.outcome,
            details = ?entry.details,
            "AUDIT"
        );
    }
}
