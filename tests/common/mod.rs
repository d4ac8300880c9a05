#![allow(dead_code)]

use check_it_all::analyzer::{Analyzer, AnalyzerError, RiskLevel, SampleStatus, Verdict};
use dashmap::{DashMap, DashSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type Classifier = dyn Fn(&[u8]) -> Verdict + Send + Sync;

struct MockSample {
    verdict: Verdict,
    polls: u32,
}

/// Deterministic in-process analyzer.
///
/// The final verdict of an uploaded sample is derived from its content (see
/// [`verdict_from_content`]). Each sample reports `Arrived` for the first
/// `arrived_polls` queries and `Processing` for the next `processing_polls`
/// before reaching its final verdict. Every call is counted.
pub struct MockAnalyzer {
    samples: DashMap<String, MockSample>,
    preloaded: DashSet<String>,
    arrived_polls: u32,
    processing_polls: u32,
    classify: Box<Classifier>,
    keep_uploads: bool,
    outage: AtomicBool,
    registered: AtomicBool,
    registrations: AtomicUsize,
    duplicate_checks: AtomicUsize,
    uploads: AtomicUsize,
    verdict_queries: AtomicUsize,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self {
            samples: DashMap::new(),
            preloaded: DashSet::new(),
            arrived_polls: 0,
            processing_polls: 0,
            classify: Box::new(|content: &[u8]| verdict_from_content("", content)),
            keep_uploads: true,
            outage: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            registrations: AtomicUsize::new(0),
            duplicate_checks: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            verdict_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_arrived_polls(mut self, polls: u32) -> Self {
        self.arrived_polls = polls;
        self
    }

    pub fn with_processing_polls(mut self, polls: u32) -> Self {
        self.processing_polls = polls;
        self
    }

    pub fn with_classifier<F>(mut self, classify: F) -> Self
    where
        F: Fn(&[u8]) -> Verdict + Send + Sync + 'static,
    {
        self.classify = Box::new(classify);
        self
    }

    /// Pretend the analyzer already holds a sample with this fingerprint
    /// whose final verdict is `verdict`.
    pub fn with_known_sample(self, verdict: Verdict) -> Self {
        let fingerprint = verdict.sha1.to_ascii_lowercase();
        self.preloaded.insert(fingerprint.clone());
        self.samples.insert(fingerprint, MockSample { verdict, polls: 0 });
        self
    }

    /// Accept uploads but never remember them, so polling reports `NotFound`.
    pub fn forgetting_uploads(mut self) -> Self {
        self.keep_uploads = false;
        self
    }

    /// Make every verdict query fail as if the service were unreachable.
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn duplicate_checks(&self) -> usize {
        self.duplicate_checks.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn verdict_queries(&self) -> usize {
        self.verdict_queries.load(Ordering::SeqCst)
    }

    fn next_verdict(&self, fingerprint: &str) -> Verdict {
        let Some(mut sample) = self.samples.get_mut(fingerprint) else {
            return Verdict::new(fingerprint, SampleStatus::NotFound);
        };
        sample.polls += 1;
        let polls = sample.polls;
        if polls <= self.arrived_polls {
            Verdict::new(fingerprint, SampleStatus::Arrived)
        } else if polls <= self.arrived_polls + self.processing_polls {
            Verdict::new(fingerprint, SampleStatus::Processing)
        } else {
            sample.verdict.clone()
        }
    }
}

impl Analyzer for MockAnalyzer {
    fn register(&self) -> Result<(), AnalyzerError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if self.registered.swap(true, Ordering::SeqCst) {
            return Err(AnalyzerError::AlreadyRegistered);
        }
        Ok(())
    }

    fn check_duplicate(&self, fingerprints: &[String]) -> Result<Vec<String>, AnalyzerError> {
        self.duplicate_checks.fetch_add(1, Ordering::SeqCst);
        Ok(fingerprints
            .iter()
            .filter(|fp| self.samples.contains_key(fp.to_ascii_lowercase().as_str()))
            .cloned()
            .collect())
    }

    fn upload(&self, path: &Path, fingerprint: &str) -> Result<(), AnalyzerError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let content = fs::read(path)?;
        if !self.keep_uploads {
            return Ok(());
        }
        let mut verdict = (self.classify)(&content);
        verdict.sha1 = fingerprint.to_string();
        self.samples
            .entry(fingerprint.to_ascii_lowercase())
            .or_insert(MockSample { verdict, polls: 0 });
        Ok(())
    }

    fn get_verdict(&self, fingerprints: &[String]) -> Result<Vec<Verdict>, AnalyzerError> {
        self.verdict_queries.fetch_add(1, Ordering::SeqCst);
        if self.outage.load(Ordering::SeqCst) {
            return Err(AnalyzerError::Status {
                code: 503,
                body: "analyzer unavailable".to_string(),
            });
        }
        Ok(fingerprints
            .iter()
            .map(|fp| {
                let mut verdict = self.next_verdict(&fp.to_ascii_lowercase());
                verdict.sha1 = fp.clone();
                verdict
            })
            .collect())
    }
}

/// Verdict keyed on words in the sample content: `high_risk`, `medium_risk`,
/// `low_risk`, `no_risk_found`, `unsupported`, `scan_error`, `scan_timeout`
/// and `bad_rating` (a `Done` verdict with an out-of-range risk level).
/// Anything else is `NoRiskFound`.
pub fn verdict_from_content(sha1: &str, content: &[u8]) -> Verdict {
    let text = String::from_utf8_lossy(content);
    let done = |risk| Verdict::done(sha1, risk);
    if text.contains("high_risk") {
        done(RiskLevel::HighRisk)
    } else if text.contains("medium_risk") {
        done(RiskLevel::MediumRisk)
    } else if text.contains("low_risk") {
        done(RiskLevel::LowRisk)
    } else if text.contains("unsupported") {
        done(RiskLevel::Unsupported)
    } else if text.contains("scan_error") {
        Verdict::new(sha1, SampleStatus::Error)
    } else if text.contains("scan_timeout") {
        Verdict::new(sha1, SampleStatus::Timeout)
    } else if text.contains("bad_rating") {
        Verdict {
            sha1: sha1.to_string(),
            sample_status: SampleStatus::Done,
            risk_level: -1,
        }
    } else {
        done(RiskLevel::NoRiskFound)
    }
}
