use super::{Analyzer, AnalyzerError, Verdict};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::path::Path;
use tracing::trace;

/// Run-scoped caching decorator around an [`Analyzer`].
///
/// Remembers fingerprints the analyzer is known to hold and terminal verdicts,
/// so repeated questions about identical content are answered locally.
/// Non-terminal verdicts always go to the wrapped analyzer. Nothing outlives
/// the value itself.
pub struct CachedAnalyzer<A> {
    inner: A,
    known: DashSet<String>,
    verdicts: DashMap<String, Verdict>,
}

impl<A: Analyzer> CachedAnalyzer<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            known: DashSet::new(),
            verdicts: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn cached_verdicts(&self) -> usize {
        self.verdicts.len()
    }
}

impl<A: Analyzer> Analyzer for CachedAnalyzer<A> {
    fn register(&self) -> Result<(), AnalyzerError> {
        self.inner.register()
    }

    fn check_duplicate(&self, fingerprints: &[String]) -> Result<Vec<String>, AnalyzerError> {
        let unknown: Vec<String> = fingerprints
            .iter()
            .filter(|fp| !self.known.contains(fp.to_ascii_lowercase().as_str()))
            .cloned()
            .collect();

        if !unknown.is_empty() {
            for fp in self.inner.check_duplicate(&unknown)? {
                self.known.insert(fp.to_ascii_lowercase());
            }
        }

        Ok(fingerprints
            .iter()
            .filter(|fp| self.known.contains(fp.to_ascii_lowercase().as_str()))
            .cloned()
            .collect())
    }

    fn upload(&self, path: &Path, fingerprint: &str) -> Result<(), AnalyzerError> {
        self.inner.upload(path, fingerprint)?;
        self.known.insert(fingerprint.to_ascii_lowercase());
        Ok(())
    }

    fn get_verdict(&self, fingerprints: &[String]) -> Result<Vec<Verdict>, AnalyzerError> {
        let missing: Vec<String> = fingerprints
            .iter()
            .filter(|fp| !self.verdicts.contains_key(fp.as_str()))
            .cloned()
            .collect();

        let fresh = if missing.is_empty() {
            Vec::new()
        } else {
            self.inner.get_verdict(&missing)?
        };
        if fresh.len() != missing.len() {
            return Err(AnalyzerError::Decode(format!(
                "asked for {} verdicts, got {}",
                missing.len(),
                fresh.len()
            )));
        }

        let mut fresh: HashMap<String, Verdict> = missing.into_iter().zip(fresh).collect();
        fingerprints
            .iter()
            .map(|fp| {
                if let Some(verdict) = self.verdicts.get(fp.as_str()) {
                    trace!("Verdict for {} answered from cache", fp);
                    return Ok(verdict.clone());
                }
                let verdict = fresh.remove(fp).ok_or_else(|| {
                    AnalyzerError::Decode(format!("no verdict returned for {}", fp))
                })?;
                if verdict.sample_status.is_terminal() {
                    self.verdicts.insert(fp.clone(), verdict.clone());
                }
                Ok(verdict)
            })
            .collect()
    }
}
