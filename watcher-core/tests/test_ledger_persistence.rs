use chrono::{NaiveDate, NaiveDateTime};
use watcher_core::{PeriodKey, TaskLedger, default_catalog};

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

#[test]
fn test_round_trip_preserves_every_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daily_tasks_v2.json");

    let mut ledger = TaskLedger::open(default_catalog(), &path);
    let now = at(2024, 1, 3, 1, 0);
    ledger.try_auto_complete("討伐殲滅戰", now);
    ledger.try_auto_complete("Fashion Report", now);
    ledger.set_status("roulette_msq", "2023-12-30".parse().unwrap(), true, None);
    ledger.set_status("roulette_leveling", "2023-12-30".parse().unwrap(), false, None);

    let reloaded = TaskLedger::open(default_catalog(), &path);
    assert_eq!(reloaded.history(), ledger.history());

    for task in default_catalog() {
        assert_eq!(reloaded.is_done_now(&task, now), ledger.is_done_now(&task, now), "{}", task.id);
        for period in ledger.periods() {
            assert_eq!(
                reloaded.status_for(&task.id, period),
                ledger.status_for(&task.id, period)
            );
        }
    }
}

#[test]
fn test_file_is_pretty_printed_period_buckets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");

    let mut ledger = TaskLedger::open(default_catalog(), &path);
    ledger.complete("roulette_trials", "2024-01-02".parse().unwrap(), at(2024, 1, 2, 23, 5));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["2024-01-02"]["roulette_trials"]["completed"], true);
    assert_eq!(value["2024-01-02"]["roulette_trials"]["completedAt"], "2024-01-02T23:05:00");
}

#[test]
fn test_missing_or_corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();

    let missing = TaskLedger::open(default_catalog(), dir.path().join("missing.json"));
    assert!(missing.history().is_empty());

    let corrupt_path = dir.path().join("corrupt.json");
    std::fs::write(&corrupt_path, "{ \"2024-01-02\": [").unwrap();
    let corrupt = TaskLedger::open(default_catalog(), &corrupt_path);
    assert!(corrupt.history().is_empty());
    assert!(TaskLedger::load(&corrupt_path).is_err());
}

#[test]
fn test_write_failure_keeps_memory_state() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be makes every write fail.
    let path = dir.path().join("ledger.json");
    std::fs::create_dir(&path).unwrap();

    let mut ledger = TaskLedger::open(default_catalog(), &path);
    let key: PeriodKey = "2024-01-02".parse().unwrap();
    ledger.complete("roulette_trials", key, at(2024, 1, 2, 23, 5));
    assert!(ledger.is_completed("roulette_trials", key));
    assert!(ledger.save().is_err());
}

#[test]
fn test_desktop_name_keyed_file_is_visible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daily_tasks_v2.json");
    std::fs::write(
        &path,
        r#"{ "2024-01-02": { "討伐殲滅戰": true, "主線任務": false } }"#,
    )
    .unwrap();

    let mut ledger = TaskLedger::open(default_catalog(), &path);
    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let snap = ledger.snapshot_on(day);
    let trials = snap.iter().find(|s| s.id == "roulette_trials").unwrap();
    let msq = snap.iter().find(|s| s.id == "roulette_msq").unwrap();
    assert!(trials.done);
    assert!(!msq.done);

    let task = ledger.task("roulette_trials").unwrap().clone();
    assert!(ledger.is_done_now(&task, at(2024, 1, 3, 1, 0)));
    // Already done this period, so the keyword does not complete it again.
    assert_eq!(ledger.try_auto_complete("討伐殲滅戰", at(2024, 1, 3, 1, 0)), None);

    // The next write stores catalog ids.
    ledger.complete("roulette_msq", "2024-01-02".parse().unwrap(), at(2024, 1, 3, 1, 0));
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let bucket = value["2024-01-02"].as_object().unwrap();
    assert_eq!(bucket["roulette_trials"]["completed"], true);
    assert!(!bucket.contains_key("討伐殲滅戰"));
}
