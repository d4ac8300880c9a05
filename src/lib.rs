pub mod aggregate;
pub mod analyzer;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hasher;
pub mod poller;
pub mod policy;
pub mod progress;
pub mod sample;
pub mod scanner;

pub use aggregate::{RunOutcome, RunStats};
pub use analyzer::{Analyzer, RiskLevel, SampleStatus, Verdict};
pub use config::AppConfig;
pub use engine::AdmissionEngine;
pub use error::Error;
pub use filter::Filter;
pub use policy::Policy;
pub use progress::{ProgressReporter, SilentReporter};
