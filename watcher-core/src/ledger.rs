//! Per-period completion records for the task catalog.
//!
//! Canonical representation is the reset boundary. Records are bucketed by
//! the boundary's [`PeriodKey`], and each record keeps the instant it was
//! completed so the `completed_at > boundary` check can be applied too.
//!
//! Persistence: every mutation rewrites the whole JSON file (pretty-printed).
//! A failed write is logged and the in-memory ledger stays authoritative; a
//! crash before the next successful write loses that mutation.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::calendar::{PeriodKey, boundary};
use crate::error::{Result, WatcherError};
use crate::task::TaskDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredState")]
pub struct TaskState {
    pub completed: bool,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

/// On-disk forms: a bare flag (bucketed legacy form) or the full record.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredState {
    Flag(bool),
    Full {
        #[serde(alias = "done")]
        completed: bool,
        #[serde(rename = "completedAt", default)]
        completed_at: Option<NaiveDateTime>,
    },
}

impl From<StoredState> for TaskState {
    fn from(s: StoredState) -> Self {
        match s {
            StoredState::Flag(completed) => TaskState {
                completed,
                completed_at: None,
            },
            StoredState::Full {
                completed,
                completed_at,
            } => TaskState {
                completed,
                completed_at,
            },
        }
    }
}

impl TaskState {
    pub fn done_at(at: NaiveDateTime) -> Self {
        Self {
            completed: true,
            completed_at: Some(at),
        }
    }

    /// Timestamp-comparison view: still valid for the period starting at `boundary`.
    ///
    /// A completion exactly at the boundary does not count. Records without a
    /// timestamp (legacy flags) are trusted as-is.
    pub fn valid_since(&self, boundary: NaiveDateTime) -> bool {
        self.completed && self.completed_at.is_none_or(|at| at > boundary)
    }
}

pub type History = BTreeMap<PeriodKey, BTreeMap<String, TaskState>>;

/// One catalog entry with its status for a given period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub name: String,
    pub frequency: &'static str,
    pub period: PeriodKey,
    pub done: bool,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskLedger {
    catalog: Vec<TaskDefinition>,
    history: History,
    path: Option<PathBuf>,
}

impl TaskLedger {
    /// In-memory ledger; nothing is persisted.
    pub fn new(catalog: Vec<TaskDefinition>) -> Self {
        Self {
            catalog,
            history: History::new(),
            path: None,
        }
    }

    /// Ledger backed by `path`. A missing or corrupt file starts empty (with a warning).
    ///
    /// Records keyed by display name are re-keyed to catalog ids on load.
    pub fn open(catalog: Vec<TaskDefinition>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let history = match Self::load(&path) {
            Ok(Some(h)) => {
                debug!(path = %path.display(), periods = h.len(), "ledger loaded");
                rekey_by_id(h, &catalog)
            }
            Ok(None) => History::new(),
            Err(e) => {
                warn!(error = %e, "ledger unreadable; starting empty");
                History::new()
            }
        };
        Self {
            catalog,
            history,
            path: Some(path),
        }
    }

    /// Read a ledger file. A missing file is `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<History>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path).map_err(|e| WatcherError::io(path, e))?;
        let history = serde_json::from_str(&json).map_err(|e| WatcherError::json(path, e))?;
        Ok(Some(history))
    }

    /// Write the whole ledger to its backing file, if any.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| WatcherError::io(dir, e))?;
        }
        let json = serde_json::to_string_pretty(&self.history)
            .map_err(|e| WatcherError::json(path, e))?;
        fs::write(path, json).map_err(|e| WatcherError::io(path, e))
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "ledger write failed; keeping in-memory state");
        }
    }

    pub fn catalog(&self) -> &[TaskDefinition] {
        &self.catalog
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn task(&self, id: &str) -> Option<&TaskDefinition> {
        self.catalog.iter().find(|t| t.id == id)
    }

    /// Look a task up by id, then by display name.
    pub fn find_task(&self, query: &str) -> Option<&TaskDefinition> {
        lookup(&self.catalog, query.trim())
    }

    /// Period keys with at least one record, oldest first.
    pub fn periods(&self) -> impl Iterator<Item = PeriodKey> + '_ {
        self.history.keys().copied()
    }

    pub fn status_for(&self, task_id: &str, period: PeriodKey) -> Option<&TaskState> {
        self.history.get(&period).and_then(|bucket| bucket.get(task_id))
    }

    /// Bucket view: is there a completed record under `period`?
    pub fn is_completed(&self, task_id: &str, period: PeriodKey) -> bool {
        self.status_for(task_id, period).is_some_and(|s| s.completed)
    }

    /// Mark `task_id` complete for `period` and persist.
    pub fn complete(&mut self, task_id: &str, period: PeriodKey, at: NaiveDateTime) {
        self.set_status(task_id, period, true, Some(at));
    }

    /// Overwrite the record for `task_id` in `period` and persist.
    pub fn set_status(
        &mut self,
        task_id: &str,
        period: PeriodKey,
        completed: bool,
        at: Option<NaiveDateTime>,
    ) {
        let state = TaskState {
            completed,
            completed_at: if completed { at } else { None },
        };
        self.history
            .entry(period)
            .or_default()
            .insert(task_id.to_string(), state);
        self.persist();
    }

    /// Done for the period containing `now`.
    pub fn is_done_now(&self, task: &TaskDefinition, now: NaiveDateTime) -> bool {
        let start = boundary(task.reset, now);
        self.status_for(&task.id, PeriodKey::from_boundary(start))
            .is_some_and(|s| s.valid_since(start))
    }

    /// Complete the first catalog task (in catalog order) that is not yet done
    /// for its current period and has a keyword contained in `text`.
    ///
    /// Matching is exact, case-sensitive substring containment.
    pub fn try_auto_complete(&mut self, text: &str, now: NaiveDateTime) -> Option<String> {
        let (task_id, keyword, period) = self.catalog.iter().find_map(|task| {
            if self.is_done_now(task, now) {
                return None;
            }
            task.keyword_in(text).map(|k| {
                (
                    task.id.clone(),
                    k.to_string(),
                    PeriodKey::current(task.reset, now),
                )
            })
        })?;

        info!(task = %task_id, keyword = %keyword, period = %period, "task completed");
        self.complete(&task_id, period, now);
        Some(task_id)
    }

    /// Every catalog task with its status for the period containing `now`.
    pub fn snapshot(&self, now: NaiveDateTime) -> Vec<TaskSnapshot> {
        self.catalog
            .iter()
            .map(|task| {
                let period = PeriodKey::current(task.reset, now);
                let completed_at = self
                    .status_for(&task.id, period)
                    .and_then(|s| s.completed_at);
                TaskSnapshot {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    frequency: task.reset.label(),
                    period,
                    done: self.is_done_now(task, now),
                    completed_at,
                }
            })
            .collect()
    }

    /// Every catalog task with its status for the period in effect on `date`.
    pub fn snapshot_on(&self, date: NaiveDate) -> Vec<TaskSnapshot> {
        self.catalog
            .iter()
            .map(|task| {
                let period = PeriodKey::on_date(task.reset, date);
                let state = self.status_for(&task.id, period);
                TaskSnapshot {
                    id: task.id.clone(),
                    name: task.name.clone(),
                    frequency: task.reset.label(),
                    period,
                    done: state.is_some_and(|s| s.completed),
                    completed_at: state.and_then(|s| s.completed_at),
                }
            })
            .collect()
    }
}

fn lookup<'a>(catalog: &'a [TaskDefinition], key: &str) -> Option<&'a TaskDefinition> {
    catalog
        .iter()
        .find(|t| t.id == key)
        .or_else(|| catalog.iter().find(|t| t.name == key))
}

/// Re-key every bucket by catalog id.
///
/// Files from the desktop tool key records by display name. An id-keyed
/// record wins over a name-keyed one for the same task; keys matching no
/// catalog entry are kept untouched.
fn rekey_by_id(history: History, catalog: &[TaskDefinition]) -> History {
    history
        .into_iter()
        .map(|(period, bucket)| {
            let mut rekeyed = BTreeMap::new();
            for (key, state) in bucket {
                match lookup(catalog, &key) {
                    Some(task) if task.id == key => {
                        rekeyed.insert(key, state);
                    }
                    Some(task) => {
                        rekeyed.entry(task.id.clone()).or_insert(state);
                    }
                    None => {
                        rekeyed.entry(key).or_insert(state);
                    }
                }
            }
            (period, rekeyed)
        })
        .collect()
}
