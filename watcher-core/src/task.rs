//! Task catalog: the fixed set of trackable duties and their reset anchors.
//!
//! Definitions are immutable after startup. Keywords are matched by exact
//! substring against resolved event names (see `ledger::TaskLedger::try_auto_complete`).

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// When a task's completion resets, in local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "lowercase")]
pub enum Reset {
    Daily { hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
}

impl Reset {
    pub fn hour(&self) -> u32 {
        match *self {
            Reset::Daily { hour } | Reset::Weekly { hour, .. } => hour,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Reset::Daily { .. } => "daily",
            Reset::Weekly { .. } => "weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub name: String,
    /// Ordered synonyms; any one appearing in a resolved name completes the task.
    pub keywords: Vec<String>,
    pub reset: Reset,
}

impl TaskDefinition {
    /// A daily task reset at 00:00 whose only keyword is its name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            keywords: vec![name.clone()],
            name,
            reset: Reset::Daily { hour: 0 },
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn daily(mut self, hour: u32) -> Self {
        self.reset = Reset::Daily { hour };
        self
    }

    pub fn weekly(mut self, weekday: Weekday, hour: u32) -> Self {
        self.reset = Reset::Weekly { weekday, hour };
        self
    }

    /// First keyword contained in `text`, if any. Case-sensitive, exact containment.
    pub fn keyword_in(&self, text: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .find(|k| !k.is_empty() && text.contains(k))
    }
}

/// Daily duties reset at 23:00 local (midnight Japan time seen from Taiwan).
pub const DAILY_RESET_HOUR: u32 = 23;
/// Weekly duties reset Tuesday 16:00 local.
pub const WEEKLY_RESET_HOUR: u32 = 16;
pub const WEEKLY_RESET_DAY: Weekday = Weekday::Tue;

/// The built-in catalog, in matching order.
pub fn default_catalog() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("roulette_expert", "專家")
            .with_keywords(["專家", "Expert"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_level50_60_70_80", "拾級迷宮")
            .with_keywords(["拾級迷宮", "Level 50/60/70/80", "50/60/70/80"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_leveling", "練級")
            .with_keywords(["練級", "Leveling"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_trials", "討伐殲滅戰")
            .with_keywords(["討伐殲滅戰", "Trials"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_msq", "主線任務")
            .with_keywords([
                "主線任務",
                "Main Scenario",
                "神兵要塞帝國南方堡",
                "最終決戰天幕魔導城",
                "究極武器破壞作戰",
            ])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_alliance", "團隊任務")
            .with_keywords(["團隊任務", "Alliance Raids"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_normal", "大型任務")
            .with_keywords(["大型任務", "Normal Raids"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("roulette_frontline", "紛爭前線")
            .with_keywords(["紛爭前線", "Frontline"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("grand_company_supply", "籌備任務")
            .with_keywords(["籌備任務", "Grand Company Supply"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("tribal_quests", "友好部族")
            .with_keywords(["友好部族", "Tribal Quests"])
            .daily(DAILY_RESET_HOUR),
        TaskDefinition::new("custom_deliveries", "老主顧")
            .with_keywords(["老主顧", "Custom Deliveries"])
            .weekly(WEEKLY_RESET_DAY, WEEKLY_RESET_HOUR),
        TaskDefinition::new("fashion_report", "時尚品鑑")
            .with_keywords(["時尚品鑑", "Fashion Report"])
            .weekly(WEEKLY_RESET_DAY, WEEKLY_RESET_HOUR),
    ]
}
