use crate::config::AppConfig;
use crate::error::Error;
use crate::scanner::{self, FileDescriptor, MimeResolver};
use config::{Config, File as ConfigFile};
use glob::Pattern;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, trace};

/// What a rule's pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Path,
    Mime,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Path => f.write_str("path"),
            MatchKind::Mime => f.write_str("mime"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub submit: bool,
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterSpec {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
pub struct Rule {
    submit: bool,
    kind: MatchKind,
    pattern: Pattern,
}

impl Rule {
    /// Compile `pattern` with shell wildcard rules. A `[` that never closes
    /// matches itself, as it does for `fnmatch`.
    pub fn new(submit: bool, kind: MatchKind, pattern: &str) -> Result<Self, Error> {
        let pattern = Pattern::new(pattern)
            .or_else(|_| Pattern::new(&literal_unclosed_brackets(pattern)))
            .map_err(|source| Error::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            submit,
            kind,
            pattern,
        })
    }

    /// `Some(submit)` when the rule matches `file`, `None` otherwise.
    fn check(&self, file: &FileDescriptor, mime: &dyn MimeResolver) -> Result<Option<bool>, Error> {
        let matched = match self.kind {
            MatchKind::Path => self.pattern.matches(&file.path().to_string_lossy()),
            MatchKind::Mime => self.pattern.matches(file.mime(mime)?),
        };
        Ok(matched.then_some(self.submit))
    }
}

/// Rewrite every `[` without a closing `]` as the class `[[]`.
fn literal_unclosed_brackets(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 2);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '[' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        // A class holds at least one character, so a leading `]` (after an
        // optional `!`) is a member rather than the terminator.
        let mut first = i + 1;
        if chars.get(first) == Some(&'!') {
            first += 1;
        }
        let close = chars
            .get(first + 1..)
            .and_then(|rest| rest.iter().position(|&c| c == ']'))
            .map(|offset| first + 1 + offset);
        match close {
            Some(end) => {
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            None => {
                out.push_str("[[]");
                i += 1;
            }
        }
    }
    out
}

/// Ordered rule set deciding which files are submitted for analysis.
///
/// The first matching rule wins; a file no rule matches is not submitted.
/// Read-only after construction and shared by all prescan workers.
pub struct Filter {
    rules: Vec<Rule>,
    mime: Arc<dyn MimeResolver>,
}

impl Filter {
    pub fn new(rules: Vec<Rule>, mime: Arc<dyn MimeResolver>) -> Self {
        Self { rules, mime }
    }

    /// Filter used when none is configured: every regular file is submitted.
    pub fn submit_all(mime: Arc<dyn MimeResolver>) -> Result<Self, Error> {
        let rule = Rule::new(true, MatchKind::Path, "*")?;
        Ok(Self::new(vec![rule], mime))
    }

    pub fn from_specs(specs: Vec<RuleSpec>, mime: Arc<dyn MimeResolver>) -> Result<Self, Error> {
        let rules = specs
            .into_iter()
            .map(|spec| Rule::new(spec.submit, spec.kind, &spec.value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, mime))
    }

    /// Load a filter file (`rules: [{submit, type, value}]`, any format the
    /// config crate understands, picked by extension).
    pub fn load(path: &Path, mime: Arc<dyn MimeResolver>) -> Result<Self, Error> {
        let spec = Config::builder()
            .add_source(ConfigFile::from(path).required(true))
            .build()
            .and_then(|config| config.try_deserialize::<FilterSpec>())
            .map_err(|source| Error::Filter {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_specs(spec.rules, mime)
    }

    /// The filter named by `config.filter`, or [`Filter::submit_all`] when
    /// none is configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let mime = scanner::resolver_for(config.run.mime);
        match &config.filter {
            Some(path) => {
                let filter = Self::load(path, mime)?;
                info!("Loaded {} filter rules from {}", filter.rules().len(), path.display());
                Ok(filter)
            }
            None => Self::submit_all(mime),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn evaluate(&self, file: &FileDescriptor) -> Result<bool, Error> {
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(submit) = rule.check(file, self.mime.as_ref())? {
                trace!(
                    "Rule #{} ({} '{}') matched {}: submit={}",
                    index,
                    rule.kind,
                    rule.pattern.as_str(),
                    file.path().display(),
                    submit
                );
                return Ok(submit);
            }
        }
        Ok(false)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("rules", &self.rules).finish()
    }
}
