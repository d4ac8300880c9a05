use crate::analyzer::{RiskLevel, SampleStatus, Verdict};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

/// Outcome categories an operator decides admission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    HighRisk,
    MediumRisk,
    LowRisk,
    Error,
    Unscannable,
    Timeout,
    BigFile,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::HighRisk,
        Category::MediumRisk,
        Category::LowRisk,
        Category::Error,
        Category::Unscannable,
        Category::Timeout,
        Category::BigFile,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::HighRisk => "high_risk",
            Category::MediumRisk => "medium_risk",
            Category::LowRisk => "low_risk",
            Category::Error => "error",
            Category::Unscannable => "unscannable",
            Category::Timeout => "timeout",
            Category::BigFile => "big_file",
        };
        f.write_str(name)
    }
}

/// Operator-supplied accept/reject decision per outcome category.
/// `true` admits files in that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Policy {
    pub high_risk: bool,
    pub medium_risk: bool,
    pub low_risk: bool,
    pub error: bool,
    pub unscannable: bool,
    pub timeout: bool,
    pub big_file: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            high_risk: false,
            medium_risk: false,
            low_risk: false,
            error: false,
            unscannable: true,
            timeout: false,
            big_file: true,
        }
    }
}

impl Policy {
    /// Same decision for every category.
    pub fn uniform(admit: bool) -> Self {
        Self {
            high_risk: admit,
            medium_risk: admit,
            low_risk: admit,
            error: admit,
            unscannable: admit,
            timeout: admit,
            big_file: admit,
        }
    }

    pub fn with(mut self, category: Category, admit: bool) -> Self {
        *self.slot(category) = admit;
        self
    }

    pub fn admits(&self, category: Category) -> bool {
        match category {
            Category::HighRisk => self.high_risk,
            Category::MediumRisk => self.medium_risk,
            Category::LowRisk => self.low_risk,
            Category::Error => self.error,
            Category::Unscannable => self.unscannable,
            Category::Timeout => self.timeout,
            Category::BigFile => self.big_file,
        }
    }

    fn slot(&mut self, category: Category) -> &mut bool {
        match category {
            Category::HighRisk => &mut self.high_risk,
            Category::MediumRisk => &mut self.medium_risk,
            Category::LowRisk => &mut self.low_risk,
            Category::Error => &mut self.error,
            Category::Unscannable => &mut self.unscannable,
            Category::Timeout => &mut self.timeout,
            Category::BigFile => &mut self.big_file,
        }
    }

    /// Decide whether a file with this terminal verdict is admitted.
    ///
    /// `NoRiskFound` is always admitted. A `Done` verdict carrying an unknown
    /// risk level is rejected and logged as an internal error. Handing in a
    /// non-terminal verdict is an error.
    pub fn decide(&self, verdict: &Verdict) -> Result<bool, Error> {
        let category = match verdict.sample_status {
            SampleStatus::NotFound | SampleStatus::Arrived | SampleStatus::Processing => {
                return Err(Error::VerdictNotReady(verdict.sample_status));
            }
            SampleStatus::Error => Category::Error,
            SampleStatus::Timeout => Category::Timeout,
            SampleStatus::Done => match verdict.risk() {
                Some(RiskLevel::NoRiskFound) => return Ok(true),
                Some(RiskLevel::Unsupported) => Category::Unscannable,
                Some(RiskLevel::LowRisk) => Category::LowRisk,
                Some(RiskLevel::MediumRisk) => Category::MediumRisk,
                Some(RiskLevel::HighRisk) => Category::HighRisk,
                None => {
                    error!(
                        "Unknown risk level {} for {}: rejecting",
                        verdict.risk_level, verdict.sha1
                    );
                    return Ok(false);
                }
            },
        };
        Ok(self.admits(category))
    }
}
