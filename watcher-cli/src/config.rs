use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_watcher_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub calendar: CalendarSection,
    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Seconds between samples.
    pub interval_secs: u64,
    /// File holding the latest recognized text (written by the external OCR step).
    pub source: Option<String>,
    pub dedup_capacity: usize,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            source: None,
            dedup_capacity: watcher_core::dedup::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// IANA zone whose wall clock the reset hours refer to.
    pub timezone: String,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Taipei".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub triggers: String,
    pub ledger: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            triggers: "triggers.json".to_string(),
            ledger: "daily_tasks_v2.json".to_string(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_watcher_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
