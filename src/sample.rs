use crate::analyzer::Analyzer;
use crate::error::Error;
use crate::scanner::FileDescriptor;
use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A file on its way to the analyzer, keyed by its content fingerprint.
#[derive(Debug)]
pub struct Sample {
    fingerprint: String,
    file: FileDescriptor,
}

impl Sample {
    pub fn new(fingerprint: String, file: FileDescriptor) -> Self {
        Self { fingerprint, file }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// How a sample reached the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The analyzer already knew the fingerprint.
    Known,
    /// Uploaded earlier in this run by another file with the same content.
    UploadedThisRun,
    /// Uploaded now.
    Uploaded,
}

/// Makes sure each fingerprint is uploaded at most once per run.
///
/// Files with the same content are serialized on a per-fingerprint lock, so
/// the second one only proceeds to polling after the first upload finished.
#[derive(Default)]
pub struct UploadRegistry {
    entries: DashMap<String, Arc<Mutex<bool>>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult the analyzer's duplicate check and upload the sample when the
    /// fingerprint is new to both the analyzer and this run.
    pub fn deliver(&self, analyzer: &dyn Analyzer, sample: &Sample) -> Result<Delivery, Error> {
        let slot = self
            .entries
            .entry(sample.fingerprint().to_string())
            .or_default()
            .clone();
        let mut uploaded = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let fingerprints = [sample.fingerprint().to_string()];
        let duplicates = analyzer.check_duplicate(&fingerprints)?;
        let known = duplicates
            .first()
            .is_some_and(|dup| dup.eq_ignore_ascii_case(sample.fingerprint()));

        if known {
            debug!("Known to analyzer: {} ({})", sample.fingerprint(), sample.path().display());
            return Ok(Delivery::Known);
        }
        if *uploaded {
            debug!(
                "Already uploaded in this run: {} ({})",
                sample.fingerprint(),
                sample.path().display()
            );
            return Ok(Delivery::UploadedThisRun);
        }

        analyzer.upload(sample.path(), sample.fingerprint())?;
        *uploaded = true;
        info!("Uploaded {}", sample.path().display());
        Ok(Delivery::Uploaded)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
