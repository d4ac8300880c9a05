use crate::error::Error;
use crate::policy::Policy;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_FILE_SIZE: u64 = 50_000_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;
const DEFAULT_SUBMIT_WORKERS: usize = 100;
const DEFAULT_QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub folder: Option<PathBuf>,
    pub filter: Option<PathBuf>,
    pub run: RunConfig,
    pub action: Policy,
    pub analyzer: AnalyzerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileErrorPolicy {
    /// Any per-file failure aborts the whole run.
    Abort,
    /// A per-file failure rejects that one file and the run continues.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MimeSource {
    FileCommand,
    Extension,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub skip_prefixes: Vec<PathBuf>,
    pub max_file_size: u64,
    pub poll_interval_ms: u64,
    pub max_polls: Option<u32>,
    pub prescan_workers: usize,
    pub submit_workers: usize,
    pub queue_depth: usize,
    pub on_file_error: FileErrorPolicy,
    pub mime: MimeSource,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_polls: None,
            prescan_workers: default_prescan_workers(),
            submit_workers: DEFAULT_SUBMIT_WORKERS,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            on_file_error: FileErrorPolicy::Abort,
            mime: MimeSource::FileCommand,
        }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.prescan_workers == 0 {
            return Err(Error::InvalidConfig(
                "run.prescan_workers must be at least 1".to_string(),
            ));
        }
        if self.submit_workers == 0 {
            return Err(Error::InvalidConfig(
                "run.submit_workers must be at least 1".to_string(),
            ));
        }
        if self.queue_depth == 0 {
            return Err(Error::InvalidConfig(
                "run.queue_depth must be at least 1".to_string(),
            ));
        }
        if self.max_polls == Some(0) {
            return Err(Error::InvalidConfig(
                "run.max_polls must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub client_uuid: String,
    pub product_name: String,
    pub hostname: String,
    pub source_id: String,
    pub source_name: String,
    pub ignore_tls_error: bool,
    pub timeout_secs: u64,
    pub cache: bool,
}

impl AnalyzerConfig {
    pub fn url(&self) -> Result<&str, Error> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::InvalidConfig("analyzer.url is missing".to_string()))
    }
}

fn default_prescan_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Load configuration from defaults, the optional `cia` file (or `path` when
/// given) and `CIA__SECTION__KEY` environment variables, in that order.
/// `CIA__RUN__SKIP_PREFIXES` takes a comma-separated list.
pub fn load_configuration(path: Option<&Path>) -> Result<AppConfig, Error> {
    load_with_environment(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix("CIA")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("run.skip_prefixes")
        .try_parsing(true)
}

fn load_with_environment(path: Option<&Path>, environment: Environment) -> Result<AppConfig, Error> {
    let file_source = match path {
        Some(path) => ConfigFile::from(path).required(true),
        None => ConfigFile::with_name("cia").required(false),
    };

    let builder = Config::builder()
        .set_default("run.skip_prefixes", Vec::<String>::new())?
        .set_default("run.max_file_size", DEFAULT_MAX_FILE_SIZE as i64)?
        .set_default("run.poll_interval_ms", DEFAULT_POLL_INTERVAL_MS as i64)?
        .set_default("run.prescan_workers", default_prescan_workers() as i64)?
        .set_default("run.submit_workers", DEFAULT_SUBMIT_WORKERS as i64)?
        .set_default("run.queue_depth", DEFAULT_QUEUE_DEPTH as i64)?
        .set_default("run.on_file_error", "abort")?
        .set_default("run.mime", "file-command")?
        .set_default("action.high_risk", false)?
        .set_default("action.medium_risk", false)?
        .set_default("action.low_risk", false)?
        .set_default("action.error", false)?
        .set_default("action.unscannable", true)?
        .set_default("action.timeout", false)?
        .set_default("action.big_file", true)?
        .set_default("analyzer.api_key", "")?
        .set_default("analyzer.client_uuid", "")?
        .set_default("analyzer.product_name", "cia")?
        .set_default("analyzer.hostname", "localhost")?
        .set_default("analyzer.source_id", "500")?
        .set_default("analyzer.source_name", "pipeline")?
        .set_default("analyzer.ignore_tls_error", false)?
        .set_default("analyzer.timeout_secs", 120_i64)?
        .set_default("analyzer.cache", true)?
        .add_source(file_source)
        .add_source(environment)
        .build()?;

    let mut config = builder.try_deserialize::<AppConfig>()?;
    config.run.skip_prefixes =
        normalize_skip_prefixes(std::mem::take(&mut config.run.skip_prefixes));
    config.run.validate()?;
    Ok(config)
}

/// Remove prefixes that are nested under other prefixes in the list.
pub fn normalize_skip_prefixes(prefixes: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for prefix in prefixes {
        if result.iter().any(|kept| prefix.starts_with(kept)) {
            continue;
        }
        result.retain(|kept| !kept.starts_with(&prefix));
        result.push(prefix);
    }

    result
}
