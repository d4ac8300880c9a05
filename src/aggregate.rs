use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every pipeline worker. `rejected` decides the run;
/// the rest are reported in the summary.
#[derive(Debug, Default)]
pub struct RunAggregate {
    rejected: AtomicU64,
    admitted: AtomicU64,
    ignored: AtomicU64,
    oversize: AtomicU64,
    submitted: AtomicU64,
    uploaded: AtomicU64,
    file_errors: AtomicU64,
}

impl RunAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn admit(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, admitted: bool) {
        if admitted {
            self.admit();
        } else {
            self.reject();
        }
    }

    pub fn ignore(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn oversize(&self) {
        self.oversize.fetch_add(1, Ordering::Relaxed);
    }

    pub fn submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upload(&self) {
        self.uploaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_error(&self) {
        self.file_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Read once all workers have finished.
    pub fn snapshot(&self) -> RunStats {
        RunStats {
            rejected: self.rejected.load(Ordering::Acquire),
            admitted: self.admitted.load(Ordering::Acquire),
            ignored: self.ignored.load(Ordering::Acquire),
            oversize: self.oversize.load(Ordering::Acquire),
            submitted: self.submitted.load(Ordering::Acquire),
            uploaded: self.uploaded.load(Ordering::Acquire),
            file_errors: self.file_errors.load(Ordering::Acquire),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub rejected: u64,
    pub admitted: u64,
    pub ignored: u64,
    pub oversize: u64,
    pub submitted: u64,
    pub uploaded: u64,
    pub file_errors: u64,
}

/// Result of a completed run. A run that aborted produces an error instead.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub files_found: u64,
    pub skipped_entries: u64,
    pub stats: RunStats,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn inadmissible(&self) -> u64 {
        self.stats.rejected
    }

    pub fn is_success(&self) -> bool {
        self.stats.rejected == 0
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "All {} files are admissible", self.files_found)
        } else {
            write!(f, "Found {} inadmissible files", self.stats.rejected)
        }
    }
}
