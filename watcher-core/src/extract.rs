//! Event-name extraction from recognized lines.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::WatcherError;

/// Contents of the first 「…」 or “…” span.
static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[「“](.+?)[」”]").expect("valid quote pattern"));

/// Capture group a rule-supplied pattern must define.
pub const NAME_GROUP: &str = "name";

/// Contents of the first quoted span, or `None`.
pub fn extract_quoted(line: &str) -> Option<String> {
    QUOTED_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Apply `pattern` and return its `name` capture.
///
/// A malformed pattern, or one without a `name` group, is logged and yields `None`.
pub fn extract_by_pattern(line: &str, pattern: &str) -> Option<String> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(source) => {
            let err = WatcherError::Pattern {
                pattern: pattern.to_string(),
                source,
            };
            warn!(error = %err, "name extraction skipped");
            return None;
        }
    };

    if !re.capture_names().flatten().any(|n| n == NAME_GROUP) {
        warn!(pattern, "extraction pattern has no (?P<name>...) group");
        return None;
    }

    re.captures(line)
        .and_then(|caps| caps.name(NAME_GROUP))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}
