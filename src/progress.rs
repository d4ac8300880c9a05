use crate::aggregate::RunOutcome;
use std::path::Path;

/// Trait for reporting admission progress.
///
/// The CLI implements it with indicatif; library callers may ignore it.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_walk_start(&self) {}
    fn on_walk_progress(&self, _files_found: u64) {}
    fn on_walk_complete(&self, _files_found: u64, _duration_secs: f64) {}
    fn on_file_decided(&self, _path: &Path, _admitted: bool) {}
    fn on_run_complete(&self, _outcome: &RunOutcome) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
