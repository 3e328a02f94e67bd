//! Fuzzy trigger matching for OCR-garbled lines.
//!
//! `fuzzy_match` tries, in order:
//! 1) literal containment of the keyword
//! 2) edit-distance similarity `1 - d / max(len)` against the threshold
//! 3) for keywords of 4+ chars, per-character coverage >= 0.75
//!
//! Lengths are counted in chars, not bytes.

use crate::rules::{TriggerConfig, TriggerRule};

/// Minimum share of keyword glyphs that must survive for the coverage fallback.
pub const COVERAGE_THRESHOLD: f64 = 0.75;
/// Keywords shorter than this skip the coverage fallback.
pub const COVERAGE_MIN_LEN: usize = 4;

/// Edit-distance similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(input: &str, target: &str) -> f64 {
    let max_len = input.chars().count().max(target.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(input, target);
    1.0 - distance as f64 / max_len as f64
}

/// Share of `target`'s characters that occur anywhere in `input`.
pub fn coverage(input: &str, target: &str) -> f64 {
    let total = target.chars().count();
    if total == 0 {
        return 0.0;
    }
    let hits = target.chars().filter(|c| input.contains(*c)).count();
    hits as f64 / total as f64
}

pub fn fuzzy_match(input: &str, target: &str, threshold: f64) -> bool {
    if input.contains(target) {
        return true;
    }

    if similarity(input, target) >= threshold {
        return true;
    }

    target.chars().count() >= COVERAGE_MIN_LEN && coverage(input, target) >= COVERAGE_THRESHOLD
}

fn first_match<'a>(rules: &'a [TriggerRule], line: &str) -> Option<&'a TriggerRule> {
    rules
        .iter()
        .find(|rule| fuzzy_match(line, &rule.keyword, rule.threshold))
}

/// Scans ordered start/end rule lists; the first rule that matches wins,
/// regardless of how well later rules would have scored.
#[derive(Debug, Clone, Default)]
pub struct TriggerMatcher {
    config: TriggerConfig,
}

impl TriggerMatcher {
    pub fn new(config: TriggerConfig) -> Self {
        Self { config }
    }

    pub fn match_start(&self, line: &str) -> Option<&TriggerRule> {
        first_match(&self.config.start_triggers, line)
    }

    pub fn match_end(&self, line: &str) -> Option<&TriggerRule> {
        first_match(&self.config.end_triggers, line)
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Swap in a reloaded rule set.
    pub fn replace(&mut self, config: TriggerConfig) {
        self.config = config;
    }
}
