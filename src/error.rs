use crate::analyzer::SampleStatus;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Filter {path}: {source}")]
    Filter {
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Error walking {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Cannot resolve MIME type of {path}: {reason}")]
    Mime { path: PathBuf, reason: String },

    #[error("Calculating SHA1 for file {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Analyzer: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Not found by Analyzer: {fingerprint} ({path})")]
    SampleNotFound { fingerprint: String, path: PathBuf },

    #[error("Verdict is not ready: {0}")]
    VerdictNotReady(SampleStatus),

    #[error("Analyzer returned no report for {0}")]
    EmptyVerdict(String),

    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that concern a single file and may be downgraded to a rejection
    /// of that file instead of aborting the run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::Mime { .. } | Error::Fingerprint { .. })
    }
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("client is already registered")]
    AlreadyRegistered,

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response {code}: {body}")]
    Status { code: u16, body: String },

    #[error("cannot decode response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
