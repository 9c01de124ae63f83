//! Run statistics for directory sweeps

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for one sweep over a spec or data directory
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    /// Files picked up by the directory scan
    pub files_ready: u64,
    /// Files handled to completion
    pub files_processed: u64,
    /// Files that failed (bad name, unknown spec, zero rows, I/O)
    pub files_failed: u64,
    /// Files left alone (already complete, name outside the convention)
    pub files_skipped: u64,
    /// Rows persisted
    pub rows_processed: u64,
    /// Rows rejected by validation or by the store
    pub rows_failed: u64,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_ms = u64::try_from((end - start).num_milliseconds()).unwrap_or(0);
        }
    }

    pub fn inc_processed(&mut self) {
        self.files_processed += 1;
    }

    pub fn inc_failed(&mut self) {
        self.files_failed += 1;
    }

    pub fn inc_skipped(&mut self) {
        self.files_skipped += 1;
    }

    pub fn add_rows(&mut self, processed: u64, failed: u64) {
        self.rows_processed += processed;
        self.rows_failed += failed;
    }

    /// Files that reached any outcome
    pub fn files_handled(&self) -> u64 {
        self.files_processed + self.files_failed + self.files_skipped
    }

    /// Log the summary at info, or warn when anything failed
    pub fn log_summary(&self, sweep: &str) {
        if self.files_failed > 0 || self.rows_failed > 0 {
            tracing::warn!(
                sweep,
                ready = self.files_ready,
                handled = self.files_handled(),
                processed = self.files_processed,
                failed = self.files_failed,
                skipped = self.files_skipped,
                rows_processed = self.rows_processed,
                rows_failed = self.rows_failed,
                elapsed_ms = self.duration_ms,
                "Finished with failures"
            );
        } else {
            tracing::info!(
                sweep,
                ready = self.files_ready,
                handled = self.files_handled(),
                processed = self.files_processed,
                skipped = self.files_skipped,
                rows_processed = self.rows_processed,
                elapsed_ms = self.duration_ms,
                "Finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = RunStats::new();
        stats.files_ready = 3;
        stats.inc_processed();
        stats.inc_failed();
        stats.inc_skipped();
        stats.add_rows(10, 2);
        stats.complete();

        assert_eq!(stats.files_handled(), 3);
        assert_eq!(stats.rows_processed, 10);
        assert_eq!(stats.rows_failed, 2);
        assert!(stats.completed_at.is_some());
    }

    #[test]
    fn test_default_has_no_start() {
        let stats = RunStats::default();
        assert!(stats.started_at.is_none());
        assert_eq!(stats.files_handled(), 0);
    }
}
