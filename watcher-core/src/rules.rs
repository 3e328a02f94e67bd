//! Trigger rules and the trigger configuration file.
//!
//! File shape:
//! `{ "startTriggers": [Rule], "endTriggers": [Rule] }` where a rule is
//! `{ keyword, threshold?, type, fixedName?, regex?, logMessage? }`.
//! PascalCase keys and type names from older files are accepted too.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{Result, WatcherError};

pub const DEFAULT_THRESHOLD: f64 = 0.6;

/// How a matched rule contributes an event name.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Signals start/end only.
    Standard,
    /// Name comes from a quoted span in the raw line.
    ExtractName,
    /// Name is fixed by the rule.
    FixedName { name: String },
    /// Name comes from the `name` capture of a pattern.
    RegexExtract { pattern: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRule {
    pub keyword: String,
    pub threshold: f64,
    pub kind: RuleKind,
    pub log_message: String,
}

impl TriggerRule {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            threshold: DEFAULT_THRESHOLD,
            kind: RuleKind::Standard,
            log_message: String::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_kind(mut self, kind: RuleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_log_message(mut self, message: impl Into<String>) -> Self {
        self.log_message = message.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
enum RawKind {
    #[default]
    #[serde(rename = "standard", alias = "Standard")]
    Standard,
    #[serde(rename = "extract-name", alias = "ExtractName")]
    ExtractName,
    #[serde(rename = "fixed-name", alias = "FixedName")]
    FixedName,
    #[serde(rename = "regex-extract", alias = "RegexExtract")]
    RegexExtract,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRule {
    #[serde(alias = "Keyword")]
    keyword: String,
    #[serde(default = "default_threshold", alias = "Threshold")]
    threshold: f64,
    #[serde(default, rename = "type", alias = "Type")]
    kind: RawKind,
    #[serde(default, rename = "fixedName", alias = "FixedName")]
    fixed_name: Option<String>,
    #[serde(default, alias = "Regex")]
    regex: Option<String>,
    #[serde(default, rename = "logMessage", alias = "LogMessage")]
    log_message: Option<String>,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl From<RawRule> for TriggerRule {
    fn from(raw: RawRule) -> Self {
        let kind = match raw.kind {
            RawKind::Standard => RuleKind::Standard,
            RawKind::ExtractName => RuleKind::ExtractName,
            RawKind::FixedName => match non_empty(raw.fixed_name) {
                Some(name) => RuleKind::FixedName { name },
                None => {
                    warn!(keyword = %raw.keyword, "fixed-name rule without fixedName; treating as standard");
                    RuleKind::Standard
                }
            },
            RawKind::RegexExtract => match non_empty(raw.regex) {
                Some(pattern) => RuleKind::RegexExtract { pattern },
                None => {
                    warn!(keyword = %raw.keyword, "regex-extract rule without regex; treating as standard");
                    RuleKind::Standard
                }
            },
        };

        TriggerRule {
            keyword: raw.keyword,
            threshold: raw.threshold,
            kind,
            log_message: raw.log_message.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "startTriggers", alias = "StartTriggers")]
    start_triggers: Vec<RawRule>,
    #[serde(default, rename = "endTriggers", alias = "EndTriggers")]
    end_triggers: Vec<RawRule>,
}

/// Ordered start and end rule lists. First matching rule wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerConfig {
    pub start_triggers: Vec<TriggerRule>,
    pub end_triggers: Vec<TriggerRule>,
}

impl TriggerConfig {
    pub fn is_empty(&self) -> bool {
        self.start_triggers.is_empty() && self.end_triggers.is_empty()
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Ok(Self {
            start_triggers: raw.start_triggers.into_iter().map(Into::into).collect(),
            end_triggers: raw.end_triggers.into_iter().map(Into::into).collect(),
        })
    }

    /// Read and parse a trigger file. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path).map_err(|e| WatcherError::io(path, e))?;
        let cfg = Self::from_json(&json).map_err(|e| WatcherError::json(path, e))?;
        Ok(Some(cfg))
    }

    /// Like [`TriggerConfig::load`], but any problem yields empty rule sets and a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                warn!(path = %path.display(), "trigger file not found; no events can be detected");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to load trigger file; no events can be detected");
                Self::default()
            }
        }
    }
}
