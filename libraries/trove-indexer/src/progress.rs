//! Rate-limited progress counters for a walker

use std::time::{Duration, Instant};
use trove_core::ScanProgress;

/// Default minimum gap between progress events (~10 per second)
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Cumulative traversal counters with a rate limiter for reporting
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    last_emit: Instant,
    interval: Duration,
    dirs_visited: u64,
    files_found: u64,
}

impl ProgressTracker {
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last_emit: now,
            interval,
            dirs_visited: 0,
            files_found: 0,
        }
    }

    /// Restart the clock and counters
    pub fn reset(&mut self) {
        *self = Self::new(self.interval);
    }

    pub fn dir_visited(&mut self) {
        self.dirs_visited += 1;
    }

    pub fn file_found(&mut self) {
        self.files_found += 1;
    }

    /// Counters as of now
    pub fn snapshot(&self) -> ScanProgress {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> ScanProgress {
        ScanProgress {
            dirs_visited: self.dirs_visited,
            files_found: self.files_found,
            elapsed_secs: now.saturating_duration_since(self.started).as_secs(),
        }
    }

    /// Counters to report, if the interval since the last report has passed
    pub fn poll(&mut self) -> Option<ScanProgress> {
        self.poll_at(Instant::now())
    }

    pub(crate) fn poll_at(&mut self, now: Instant) -> Option<ScanProgress> {
        if now.saturating_duration_since(self.last_emit) < self.interval {
            return None;
        }

        self.last_emit = now;
        Some(self.snapshot_at(now))
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_is_rate_limited() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(100));
        let start = tracker.started;

        tracker.dir_visited();
        assert!(tracker.poll_at(start + Duration::from_millis(50)).is_none());

        let first = tracker.poll_at(start + Duration::from_millis(100)).unwrap();
        assert_eq!(first.dirs_visited, 1);

        tracker.file_found();
        assert!(tracker.poll_at(start + Duration::from_millis(150)).is_none());

        let second = tracker.poll_at(start + Duration::from_millis(210)).unwrap();
        assert_eq!(second.files_found, 1);
    }

    #[test]
    fn at_most_ten_reports_per_second() {
        let mut tracker = ProgressTracker::default();
        let start = tracker.started;

        let reports = (0..1000)
            .filter_map(|ms| tracker.poll_at(start + Duration::from_millis(ms)))
            .count();

        assert!(reports <= 10, "got {} reports", reports);
    }

    #[test]
    fn elapsed_is_whole_seconds() {
        let mut tracker = ProgressTracker::default();
        let start = tracker.started;

        let progress = tracker.poll_at(start + Duration::from_millis(2500)).unwrap();
        assert_eq!(progress.elapsed_secs, 2);
    }
}
