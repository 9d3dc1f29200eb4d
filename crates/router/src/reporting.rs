//! Delivery reporting
//!
//! Per-destination counters of success/failure bucketed by workspace and
//! error reason, flushed alongside each status-writer commit. The
//! [`Reporter`] seam keeps the router free of any concrete reporting
//! pipeline; the daemon wires a real sink, tests use [`MemoryReporter`].

use std::collections::HashMap;

use ferry_protocol::JobState;
use parking_lot::Mutex;

use crate::types::StatusEntry;

/// One reporting bucket flushed with a status commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub dest_type: String,
    pub workspace_id: String,
    pub state: JobState,

    /// Error reason, or "success"
    pub reason: String,

    pub count: u64,
}

/// Sink for reporting records
pub trait Reporter: Send + Sync {
    /// Receive the buckets of one commit; called after the transaction
    /// succeeded
    fn report(&self, entries: Vec<ReportEntry>);
}

/// Reporter that drops everything
#[derive(Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, _entries: Vec<ReportEntry>) {}
}

/// Reporter collecting entries in memory (tests, dev daemon)
#[derive(Debug, Default)]
pub struct MemoryReporter {
    entries: Mutex<Vec<ReportEntry>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }

    /// Total count across buckets for a state
    pub fn count_for(&self, state: JobState) -> u64 {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.state == state)
            .map(|e| e.count)
            .sum()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, mut entries: Vec<ReportEntry>) {
        self.entries.lock().append(&mut entries);
    }
}

/// Aggregate one commit's statuses into reporting buckets
pub(crate) fn bucket_statuses(dest_type: &str, entries: &[StatusEntry]) -> Vec<ReportEntry> {
    let mut buckets: HashMap<(String, JobState, String), u64> = HashMap::new();
    for entry in entries {
        let key = (
            entry.status.workspace_id.clone(),
            entry.status.state,
            entry.reason.clone(),
        );
        *buckets.entry(key).or_default() += 1;
    }

    let mut report: Vec<ReportEntry> = buckets
        .into_iter()
        .map(|((workspace_id, state, reason), count)| ReportEntry {
            dest_type: dest_type.to_string(),
            workspace_id,
            state,
            reason,
            count,
        })
        .collect();
    // deterministic flush order for consumers and tests
    report.sort_by(|a, b| {
        (&a.workspace_id, a.state.as_str(), &a.reason)
            .cmp(&(&b.workspace_id, b.state.as_str(), &b.reason))
    });
    report
}
