//! Structured lifecycle records emitted by arena operations.

use std::collections::VecDeque;
use std::collections::vec_deque;

/// Arena lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ArenaLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl ArenaLogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Structured arena lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this lifecycle record.
    pub trace_id: String,
    /// Severity level.
    pub level: ArenaLogLevel,
    /// API symbol (`allocate`, `release`, `resize`, `zero_allocate`, ...).
    pub symbol: &'static str,
    /// Event kind (`allocate`, `double_release_detected`, `merge`, ...).
    pub event: &'static str,
    /// Payload address involved in the event.
    pub ptr: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: allocated payload bytes.
    pub bytes_allocated: usize,
    /// Snapshot: free payload bytes.
    pub bytes_free: usize,
    /// Snapshot: free registry length.
    pub free_blocks: usize,
}

/// Bounded buffer of lifecycle records.
#[derive(Debug, Clone)]
pub(crate) struct LifecycleLog {
    records: VecDeque<ArenaLogRecord>,
    limit: usize,
    next_decision_id: u64,
}

/// Record fields supplied by the caller; the log fills in ids.
pub(crate) struct LogEvent {
    pub level: ArenaLogLevel,
    pub symbol: &'static str,
    pub event: &'static str,
    pub ptr: Option<usize>,
    pub size: Option<usize>,
    pub outcome: &'static str,
    pub details: String,
}

/// Counter snapshot attached to each record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    pub bytes_allocated: usize,
    pub bytes_free: usize,
    pub free_blocks: usize,
}

impl LifecycleLog {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
            next_decision_id: 1,
        }
    }

    pub(crate) fn push(&mut self, event: LogEvent, snapshot: Snapshot) {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(ArenaLogRecord {
            decision_id,
            trace_id: format!("core::arena::{}::{:016x}", event.symbol, decision_id),
            level: event.level,
            symbol: event.symbol,
            event: event.event,
            ptr: event.ptr,
            size: event.size,
            outcome: event.outcome,
            details: event.details,
            bytes_allocated: snapshot.bytes_allocated,
            bytes_free: snapshot.bytes_free,
            free_blocks: snapshot.free_blocks,
        });
    }

    pub(crate) fn records(&self) -> vec_deque::Iter<'_, ArenaLogRecord> {
        self.records.iter()
    }

    pub(crate) fn drain(&mut self) -> Vec<ArenaLogRecord> {
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &'static str) -> LogEvent {
        LogEvent {
            level: ArenaLogLevel::Trace,
            symbol: "allocate",
            event: name,
            ptr: None,
            size: None,
            outcome: "success",
            details: String::new(),
        }
    }

    const SNAPSHOT: Snapshot = Snapshot {
        bytes_allocated: 0,
        bytes_free: 0,
        free_blocks: 0,
    };

    #[test]
    fn oldest_records_are_dropped_at_limit() {
        let mut log = LifecycleLog::new(2);
        log.push(event("a"), SNAPSHOT);
        log.push(event("b"), SNAPSHOT);
        log.push(event("c"), SNAPSHOT);

        let events: Vec<_> = log.records().map(|r| r.event).collect();
        assert_eq!(events, vec!["b", "c"]);
        let last = log.records().last().unwrap();
        assert_eq!(last.decision_id, 3);
        assert_eq!(last.trace_id, "core::arena::allocate::0000000000000003");
    }

    #[test]
    fn zero_limit_disables_retention() {
        let mut log = LifecycleLog::new(0);
        log.push(event("a"), SNAPSHOT);
        assert!(log.drain().is_empty());
    }
}
