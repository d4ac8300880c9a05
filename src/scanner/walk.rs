use super::file::{EntryKind, FileDescriptor};
use crate::error::Error;
use crate::progress::ProgressReporter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use walkdir::WalkDir;

const PROGRESS_EVERY: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Clone, Copy)]
pub struct WalkSummary {
    pub files_found: u64,
    pub skipped_entries: u64,
    pub duration: Duration,
}

/// Pre-order walk of `root`. Every regular file is handed to `on_file`;
/// symlinks, devices, pipes, sockets and other irregular entries are skipped,
/// and directories under any of `skip_prefixes` are not descended into.
///
/// The walk stops early when `abort` is raised or when `on_file` returns
/// `false`. Any I/O error while walking is returned as [`Error::Walk`].
pub fn walk<F>(
    root: &Path,
    skip_prefixes: &[PathBuf],
    abort: &AtomicBool,
    reporter: &dyn ProgressReporter,
    mut on_file: F,
) -> Result<WalkSummary, Error>
where
    F: FnMut(FileDescriptor) -> bool,
{
    let start = Instant::now();
    let mut last_report = start;
    let mut summary = WalkSummary::default();

    reporter.on_walk_start();

    let entries = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry.path(), skip_prefixes));

    for entry in entries {
        if abort.load(Ordering::Relaxed) {
            debug!("Walk of {} interrupted", root.display());
            break;
        }

        let entry = entry.map_err(|err| Error::Walk {
            path: err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source: err,
        })?;

        let kind = EntryKind::from_file_type(entry.file_type());
        match kind {
            EntryKind::Directory => continue,
            EntryKind::Regular => {}
            other => {
                debug!("Skip {} entry: {}", other, entry.path().display());
                summary.skipped_entries += 1;
                continue;
            }
        }

        let metadata = entry.metadata().map_err(|err| Error::Walk {
            path: entry.path().to_path_buf(),
            source: err,
        })?;

        summary.files_found += 1;
        if last_report.elapsed() >= PROGRESS_EVERY {
            last_report = Instant::now();
            info!("Found {} files", summary.files_found);
        }
        reporter.on_walk_progress(summary.files_found);

        let file = FileDescriptor::new(entry.into_path(), metadata.len(), kind);
        if !on_file(file) {
            break;
        }
    }

    summary.duration = start.elapsed();
    reporter.on_walk_complete(summary.files_found, summary.duration.as_secs_f64());
    Ok(summary)
}

fn is_skipped(path: &Path, skip_prefixes: &[PathBuf]) -> bool {
    let skipped = skip_prefixes.iter().any(|prefix| path.starts_with(prefix));
    if skipped {
        debug!("Skip folder: {}", path.display());
    }
    skipped
}
