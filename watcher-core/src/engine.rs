//! Per-line pipeline and the start/end state machine.
//!
//! For every line of a recognized blob:
//! normalize -> dedup -> start/end match -> name extraction -> ledger.
//!
//! The engine owns all mutable session state (dedup window, armed name,
//! ledger) and reports what happened as [`EngineEvent`]s. It never prints or
//! assumes anything about who consumes those events.

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::dedup::DedupWindow;
use crate::extract::{extract_by_pattern, extract_quoted};
use crate::ledger::TaskLedger;
use crate::matcher::TriggerMatcher;
use crate::normalize::normalize;
use crate::rules::{RuleKind, TriggerConfig, TriggerRule};

/// Lines shorter than this (after normalization) are noise.
pub const MIN_LINE_CHARS: usize = 2;

/// A new chat line starts at each bracketed timestamp.
static LINE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d{1,2}[:：]\d{2}\]").expect("valid line-start pattern"));

/// Split a recognized blob before every `[H:MM]` timestamp and at every line break.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = LINE_START_RE.find_iter(text).map(|m| m.start()).collect();
    cuts.extend(text.match_indices(['\r', '\n']).map(|(i, _)| i));
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = Vec::new();
    let mut prev = 0;
    for cut in cuts.into_iter().chain(std::iter::once(text.len())) {
        let piece = text[prev..cut].trim();
        if !piece.is_empty() {
            out.push(piece);
        }
        prev = cut;
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArmedName {
    /// A start trigger fired but yielded no name.
    Unknown,
    Named(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Armed(ArmedName),
}

/// Which candidate resolved a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameSource {
    EndLine,
    Armed,
    RawLine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    LineAccepted {
        line: String,
    },
    StartMatched {
        keyword: String,
        message: String,
        name: Option<String>,
    },
    EndMatched {
        keyword: String,
        message: String,
    },
    TaskCompleted {
        task_id: String,
        task_name: String,
        source: NameSource,
    },
    Unresolved {
        line: String,
    },
}

#[derive(Debug)]
pub struct EventEngine {
    matcher: TriggerMatcher,
    dedup: DedupWindow,
    ledger: TaskLedger,
    state: EngineState,
}

impl EventEngine {
    pub fn new(matcher: TriggerMatcher, ledger: TaskLedger) -> Self {
        Self {
            matcher,
            dedup: DedupWindow::default(),
            ledger,
            state: EngineState::Idle,
        }
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup = DedupWindow::new(capacity);
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TaskLedger {
        &mut self.ledger
    }

    pub fn matcher(&self) -> &TriggerMatcher {
        &self.matcher
    }

    /// Forget previously seen lines (capture region changed).
    pub fn reset_dedup(&mut self) {
        self.dedup.clear();
    }

    /// Swap the trigger rules; seen lines are forgotten.
    pub fn reload_triggers(&mut self, config: TriggerConfig) {
        self.matcher.replace(config);
        self.dedup.clear();
    }

    /// Run one recognized blob through the pipeline.
    pub fn process(&mut self, text: &str, now: NaiveDateTime) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        for raw in split_lines(text) {
            let line = normalize(raw);
            if line.chars().count() < MIN_LINE_CHARS {
                continue;
            }
            if self.dedup.seen(&line) {
                continue;
            }

            debug!(line = %line, "ocr line");
            events.push(EngineEvent::LineAccepted { line: line.clone() });
            self.handle_line(raw, &line, now, &mut events);
        }

        events
    }

    fn handle_line(
        &mut self,
        raw: &str,
        line: &str,
        now: NaiveDateTime,
        events: &mut Vec<EngineEvent>,
    ) {
        if let Some(rule) = self.matcher.match_start(line) {
            let name = start_name(rule, raw, line);
            info!(keyword = %rule.keyword, name = ?name, "start trigger: {}", rule.log_message);
            events.push(EngineEvent::StartMatched {
                keyword: rule.keyword.clone(),
                message: rule.log_message.clone(),
                name: name.clone(),
            });
            self.state = EngineState::Armed(name.map_or(ArmedName::Unknown, ArmedName::Named));
            return;
        }

        let Some(rule) = self.matcher.match_end(line) else {
            return;
        };

        info!(keyword = %rule.keyword, "end trigger: {}", rule.log_message);
        events.push(EngineEvent::EndMatched {
            keyword: rule.keyword.clone(),
            message: rule.log_message.clone(),
        });

        let mut candidates: Vec<(NameSource, String)> = Vec::with_capacity(3);
        if let RuleKind::RegexExtract { pattern } = &rule.kind {
            if let Some(name) = extract_by_pattern(line, pattern) {
                debug!(name = %name, "name from end line");
                candidates.push((NameSource::EndLine, name));
            }
        }
        if let EngineState::Armed(ArmedName::Named(name)) = &self.state {
            candidates.push((NameSource::Armed, name.clone()));
        }
        candidates.push((NameSource::RawLine, line.to_string()));

        let resolved = candidates.into_iter().find_map(|(source, candidate)| {
            self.ledger
                .try_auto_complete(&candidate, now)
                .map(|task_id| (source, task_id))
        });

        match resolved {
            Some((source, task_id)) => {
                let task_name = self
                    .ledger
                    .task(&task_id)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| task_id.clone());
                events.push(EngineEvent::TaskCompleted {
                    task_id,
                    task_name,
                    source,
                });
            }
            None => {
                info!(line = %line, "end trigger matched no catalog task");
                events.push(EngineEvent::Unresolved {
                    line: line.to_string(),
                });
            }
        }

        self.state = EngineState::Idle;
    }
}

fn start_name(rule: &TriggerRule, raw: &str, line: &str) -> Option<String> {
    match &rule.kind {
        RuleKind::Standard => None,
        RuleKind::FixedName { name } => Some(name.clone()),
        RuleKind::ExtractName => extract_quoted(raw),
        RuleKind::RegexExtract { pattern } => extract_by_pattern(line, pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::default_catalog;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap()
    }

    fn engine(config: TriggerConfig) -> EventEngine {
        EventEngine::new(TriggerMatcher::new(config), TaskLedger::new(default_catalog()))
    }

    fn completed(events: &[EngineEvent]) -> Vec<(&str, NameSource)> {
        events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::TaskCompleted { task_id, source, .. } => Some((task_id.as_str(), *source)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn split_on_timestamps_and_newlines() {
        let lines = split_lines("[12:01]甲[12:02]乙\n丙\r\n\n[1:05] 丁");
        assert_eq!(lines, vec!["[12:01]甲", "[12:02]乙", "丙", "[1:05] 丁"]);
    }

    #[test]
    fn split_full_width_colon_timestamp() {
        assert_eq!(split_lines("前[12：30]後"), vec!["前", "[12：30]後"]);
    }

    #[test]
    fn start_then_end_uses_armed_name() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("任務開始").with_kind(RuleKind::ExtractName)],
            end_triggers: vec![TriggerRule::new("攻略完成")],
        };
        let mut e = engine(cfg);

        let ev = e.process("「練級」 任務開始", now());
        assert_eq!(e.state(), &EngineState::Armed(ArmedName::Named("練級".to_string())));
        assert!(matches!(ev.last(), Some(EngineEvent::StartMatched { name: Some(n), .. }) if n == "練級"));

        let ev = e.process("攻略完成", now());
        assert_eq!(completed(&ev), vec![("roulette_leveling", NameSource::Armed)]);
        assert_eq!(e.state(), &EngineState::Idle);
    }

    #[test]
    fn fixed_name_start_rule() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("已進入").with_kind(RuleKind::FixedName {
                name: "紛爭前線".to_string(),
            })],
            end_triggers: vec![TriggerRule::new("戰鬥結束")],
        };
        let mut e = engine(cfg);
        e.process("已進入 戰場", now());
        let ev = e.process("戰鬥結束", now());
        assert_eq!(completed(&ev), vec![("roulette_frontline", NameSource::Armed)]);
    }

    #[test]
    fn regex_name_on_end_line_has_priority() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("任務開始").with_kind(RuleKind::ExtractName)],
            end_triggers: vec![TriggerRule::new("完成").with_kind(RuleKind::RegexExtract {
                pattern: r"(?P<name>.+?)完成".to_string(),
            })],
        };
        let mut e = engine(cfg);
        e.process("「練級」任務開始", now());
        let ev = e.process("主線任務完成", now());
        assert_eq!(completed(&ev), vec![("roulette_msq", NameSource::EndLine)]);
        // The armed name was not consumed by a task, but the state still resets.
        assert_eq!(e.state(), &EngineState::Idle);
    }

    #[test]
    fn regex_start_rule_arms_name_from_normalized_line() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("開始").with_kind(RuleKind::RegexExtract {
                pattern: r"(?P<name>.+?)開始".to_string(),
            })],
            end_triggers: vec![TriggerRule::new("完成")],
        };
        let mut e = engine(cfg);

        // The timestamp and spaces are gone before the pattern runs.
        let ev = e.process("[21:00] 拾級迷宮 開始", now());
        assert!(matches!(ev.last(), Some(EngineEvent::StartMatched { name: Some(n), .. }) if n == "拾級迷宮"));
        assert_eq!(e.state(), &EngineState::Armed(ArmedName::Named("拾級迷宮".to_string())));

        let ev = e.process("攻略完成", now());
        assert_eq!(completed(&ev), vec![("roulette_level50_60_70_80", NameSource::Armed)]);
    }

    #[test]
    fn regex_start_rule_without_match_arms_unknown() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("開始").with_kind(RuleKind::RegexExtract {
                pattern: r"「(?P<name>.+)」開始".to_string(),
            })],
            end_triggers: vec![],
        };
        let mut e = engine(cfg);
        e.process("開始", now());
        assert_eq!(e.state(), &EngineState::Armed(ArmedName::Unknown));
    }

    #[test]
    fn raw_line_is_last_resort() {
        let cfg = TriggerConfig {
            start_triggers: vec![],
            end_triggers: vec![TriggerRule::new("完成")],
        };
        let mut e = engine(cfg);
        let ev = e.process("[2:3許 討伐殲滅戰 完成", now());
        assert_eq!(completed(&ev), vec![("roulette_trials", NameSource::RawLine)]);
    }

    #[test]
    fn unknown_armed_name_is_skipped() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("任務開始")],
            end_triggers: vec![TriggerRule::new("完成")],
        };
        let mut e = engine(cfg);
        e.process("任務開始", now());
        assert_eq!(e.state(), &EngineState::Armed(ArmedName::Unknown));
        let ev = e.process("沒有對應的完成", now());
        assert!(matches!(ev.last(), Some(EngineEvent::Unresolved { .. })));
        assert_eq!(e.state(), &EngineState::Idle);
    }

    #[test]
    fn start_takes_precedence_over_end() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("開始")],
            end_triggers: vec![TriggerRule::new("開始")],
        };
        let mut e = engine(cfg);
        let ev = e.process("開始", now());
        assert!(ev.iter().any(|x| matches!(x, EngineEvent::StartMatched { .. })));
        assert!(!ev.iter().any(|x| matches!(x, EngineEvent::EndMatched { .. })));
    }

    #[test]
    fn unmatched_line_leaves_state() {
        let cfg = TriggerConfig {
            start_triggers: vec![TriggerRule::new("任務開始").with_kind(RuleKind::FixedName {
                name: "練級".to_string(),
            })],
            end_triggers: vec![],
        };
        let mut e = engine(cfg);
        e.process("任務開始", now());
        let ev = e.process("今天天氣很好", now());
        assert_eq!(ev, vec![EngineEvent::LineAccepted { line: "今天天氣很好".to_string() }]);
        assert_eq!(e.state(), &EngineState::Armed(ArmedName::Named("練級".to_string())));
    }

    #[test]
    fn repeated_lines_are_processed_once() {
        let cfg = TriggerConfig {
            start_triggers: vec![],
            end_triggers: vec![TriggerRule::new("完成")],
        };
        let mut e = engine(cfg);
        let first = e.process("討伐殲滅戰 完成", now());
        let second = e.process("討伐殲滅戰 完成", now());
        assert_eq!(completed(&first).len(), 1);
        assert!(second.is_empty());

        e.reset_dedup();
        let third = e.process("討伐殲滅戰 完成", now());
        // Seen again after reset, but the task is already done this period.
        assert!(matches!(third.last(), Some(EngineEvent::Unresolved { .. })));
    }

    #[test]
    fn short_lines_are_dropped() {
        let mut e = engine(TriggerConfig::default());
        assert!(e.process("[12:00] 完\n \n", now()).is_empty());
    }
}
