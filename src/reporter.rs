use check_it_all::{ProgressReporter, RunOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// CLI progress reporter.
///
/// A single spinner lives for the whole run: it counts files while the walk is
/// going and decisions once analysis results come in.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    found: AtomicU64,
    decided: AtomicU64,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            found: AtomicU64::new(0),
            decided: AtomicU64::new(0),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = guard.as_ref() {
            f(pb);
        }
    }

    pub fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_walk_start(&self) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message("Scanning files...");
        pb.enable_steady_tick(Duration::from_millis(80));
        let mut guard = self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_walk_progress(&self, files_found: u64) {
        self.found.store(files_found, Ordering::Relaxed);
        let decided = self.decided.load(Ordering::Relaxed);
        self.with_bar(|pb| {
            pb.set_message(format!(
                "Scanning... {} files found, {} decided",
                files_found, decided
            ))
        });
    }

    fn on_walk_complete(&self, files_found: u64, duration_secs: f64) {
        self.found.store(files_found, Ordering::Relaxed);
        self.with_bar(|pb| {
            pb.println(format!(
                "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
                files_found, duration_secs
            ));
            pb.set_message("Waiting for analysis results...");
        });
    }

    fn on_file_decided(&self, _path: &Path, _admitted: bool) {
        let decided = self.decided.fetch_add(1, Ordering::Relaxed) + 1;
        let found = self.found.load(Ordering::Relaxed);
        self.with_bar(|pb| pb.set_message(format!("Analysis: {}/{} files decided", decided, found)));
    }

    fn on_run_complete(&self, outcome: &RunOutcome) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Run complete: {} files decided in {:.2}s",
            outcome.stats.admitted + outcome.stats.rejected,
            outcome.duration.as_secs_f64()
        );
    }
}
