use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn watcher_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".watcher"))
}

pub fn ensure_watcher_home() -> Result<PathBuf> {
    let dir = watcher_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Relative paths live under the watcher home; absolute paths are kept.
pub fn resolve(home: &Path, p: &str) -> PathBuf {
    let p = Path::new(p);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home.join(p)
    }
}

/// Starter trigger rules, written by `watcher init`.
pub const SAMPLE_TRIGGERS: &str = r#"{
  "startTriggers": [
    {
      "keyword": "已登記參加",
      "threshold": 0.6,
      "type": "extract-name",
      "logMessage": "Duty registered"
    },
    {
      "keyword": "任務開始",
      "threshold": 0.6,
      "type": "standard",
      "logMessage": "Duty started"
    }
  ],
  "endTriggers": [
    {
      "keyword": "完成",
      "threshold": 0.6,
      "type": "regex-extract",
      "regex": "(?P<name>[^:]+?)完成",
      "logMessage": "Duty complete"
    }
  ]
}
"#;

/// Write the sample trigger file unless one already exists. Returns whether it wrote.
pub fn write_sample_triggers(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::write(path, SAMPLE_TRIGGERS).with_context(|| format!("write {}", path.display()))?;
    Ok(true)
}
