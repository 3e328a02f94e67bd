//! watcher-core: turns a noisy stream of recognized overlay text into
//! calendar-correct duty completion records.

pub mod calendar;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod matcher;
pub mod normalize;
pub mod rules;
pub mod source;
pub mod task;
pub mod time;

pub use calendar::{PeriodKey, boundary, next_boundary};
pub use dedup::DedupWindow;
pub use engine::{ArmedName, EngineEvent, EngineState, EventEngine, NameSource, split_lines};
pub use error::{Result, WatcherError};
pub use extract::{extract_by_pattern, extract_quoted};
pub use ledger::{History, TaskLedger, TaskSnapshot, TaskState};
pub use matcher::{TriggerMatcher, fuzzy_match};
pub use normalize::normalize;
pub use rules::{RuleKind, TriggerConfig, TriggerRule};
pub use source::{Frame, FrameSource, Recognizer, Region};
pub use task::{Reset, TaskDefinition, default_catalog};
