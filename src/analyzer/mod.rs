pub mod cache;
pub mod http;

pub use crate::error::AnalyzerError;
pub use cache::CachedAnalyzer;
pub use http::HttpAnalyzer;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Processing state of a sample on the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SampleStatus {
    NotFound,
    Arrived,
    Processing,
    Done,
    Error,
    Timeout,
}

impl SampleStatus {
    pub const ALL: [SampleStatus; 6] = [
        SampleStatus::NotFound,
        SampleStatus::Arrived,
        SampleStatus::Processing,
        SampleStatus::Done,
        SampleStatus::Error,
        SampleStatus::Timeout,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SampleStatus::Done | SampleStatus::Error | SampleStatus::Timeout
        )
    }

    pub fn code(self) -> i32 {
        match self {
            SampleStatus::NotFound => 0,
            SampleStatus::Arrived => 1,
            SampleStatus::Processing => 2,
            SampleStatus::Done => 3,
            SampleStatus::Error => 4,
            SampleStatus::Timeout => 5,
        }
    }
}

impl TryFrom<i32> for SampleStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, String> {
        SampleStatus::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or_else(|| format!("unknown sample status {}", code))
    }
}

impl From<SampleStatus> for i32 {
    fn from(status: SampleStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleStatus::NotFound => "NotFound",
            SampleStatus::Arrived => "Arrived",
            SampleStatus::Processing => "Processing",
            SampleStatus::Done => "Done",
            SampleStatus::Error => "Error",
            SampleStatus::Timeout => "Timeout",
        };
        f.write_str(name)
    }
}

/// Risk rating of a sample whose analysis is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskLevel {
    Unsupported,
    NoRiskFound,
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Unsupported,
        RiskLevel::NoRiskFound,
        RiskLevel::LowRisk,
        RiskLevel::MediumRisk,
        RiskLevel::HighRisk,
    ];

    pub fn code(self) -> i32 {
        match self {
            RiskLevel::Unsupported => 0,
            RiskLevel::NoRiskFound => 1,
            RiskLevel::LowRisk => 2,
            RiskLevel::MediumRisk => 3,
            RiskLevel::HighRisk => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<RiskLevel> {
        RiskLevel::ALL.into_iter().find(|level| level.code() == code)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Unsupported => "Unsupported",
            RiskLevel::NoRiskFound => "NoRiskFound",
            RiskLevel::LowRisk => "LowRisk",
            RiskLevel::MediumRisk => "MediumRisk",
            RiskLevel::HighRisk => "HighRisk",
        };
        f.write_str(name)
    }
}

/// The analyzer's latest word on a sample. The risk level is kept as the raw
/// code the analyzer sent; it only means something once the status is `Done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub sha1: String,
    pub sample_status: SampleStatus,
    #[serde(default)]
    pub risk_level: i32,
}

impl Verdict {
    pub fn new(sha1: impl Into<String>, sample_status: SampleStatus) -> Self {
        Self {
            sha1: sha1.into(),
            sample_status,
            risk_level: 0,
        }
    }

    pub fn done(sha1: impl Into<String>, risk: RiskLevel) -> Self {
        Self {
            sha1: sha1.into(),
            sample_status: SampleStatus::Done,
            risk_level: risk.code(),
        }
    }

    pub fn risk(&self) -> Option<RiskLevel> {
        RiskLevel::from_code(self.risk_level)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.sample_status, self.risk()) {
            (SampleStatus::Done, Some(risk)) => write!(f, "{}", risk),
            (SampleStatus::Done, None) => write!(f, "Done (risk level {})", self.risk_level),
            (status, _) => write!(f, "{}", status),
        }
    }
}

/// Remote content-analysis service.
///
/// Implementations must be safe to share between all submit workers.
pub trait Analyzer: Send + Sync {
    /// Register this client. [`AnalyzerError::AlreadyRegistered`] is not fatal.
    fn register(&self) -> Result<(), AnalyzerError>;

    /// Return those of `fingerprints` the analyzer already holds a sample for.
    fn check_duplicate(&self, fingerprints: &[String]) -> Result<Vec<String>, AnalyzerError>;

    fn upload(&self, path: &Path, fingerprint: &str) -> Result<(), AnalyzerError>;

    /// One verdict per requested fingerprint, in request order.
    fn get_verdict(&self, fingerprints: &[String]) -> Result<Vec<Verdict>, AnalyzerError>;
}

impl<A: Analyzer + ?Sized> Analyzer for std::sync::Arc<A> {
    fn register(&self) -> Result<(), AnalyzerError> {
        (**self).register()
    }

    fn check_duplicate(&self, fingerprints: &[String]) -> Result<Vec<String>, AnalyzerError> {
        (**self).check_duplicate(fingerprints)
    }

    fn upload(&self, path: &Path, fingerprint: &str) -> Result<(), AnalyzerError> {
        (**self).upload(path, fingerprint)
    }

    fn get_verdict(&self, fingerprints: &[String]) -> Result<Vec<Verdict>, AnalyzerError> {
        (**self).get_verdict(fingerprints)
    }
}
