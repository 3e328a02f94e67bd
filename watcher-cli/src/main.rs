use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use watcher_core::{
    EngineEvent, EventEngine, PeriodKey, TaskLedger, TaskSnapshot, TriggerConfig, TriggerMatcher,
    default_catalog, time,
};

mod config;
mod poller;
mod state;
mod text_source;

use config::Config;
use poller::{Clock, Poller};
use text_source::{PassThrough, TextFileSource};

#[derive(Parser, Debug)]
#[command(
    name = "watcher",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WATCHER_BUILD_SHA"), ")"),
    about = "Track daily/weekly duty completion from recognized overlay text"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write ~/.watcher/config.toml and a sample triggers.json
    Init,

    /// Poll the recognized-text file and record completions until Ctrl-C
    Watch {
        /// Text file the OCR step writes to (overrides [watch].source)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Seconds between samples (overrides [watch].interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Feed text files through the engine once, one file per sample
    Replay {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Pretend every sample was taken at this local time (e.g. 2024-01-02T23:30:00)
        #[arg(long)]
        at: Option<NaiveDateTime>,
    },

    /// Show completion status for the current periods, or for a past date
    Status {
        /// Date to browse (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print JSON instead of a checklist
        #[arg(long)]
        json: bool,
    },

    /// Manually mark a task done (or not done) by id or name
    Mark {
        task: String,

        /// Period to mark (YYYY-MM-DD); defaults to the current one
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Clear the mark instead of setting it
        #[arg(long)]
        undo: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init => {
            let home = state::ensure_watcher_home()?;
            config::init_config()?;
            let cfg = config::load_config()?;
            let triggers = state::resolve(&home, &cfg.paths.triggers);
            if state::write_sample_triggers(&triggers)? {
                println!("Wrote {}", triggers.display());
            } else {
                println!("Triggers already exist: {}", triggers.display());
            }
        }

        Command::Watch { source, interval } => {
            let cfg = config::load_config()?;
            watch_loop(&cfg, source, interval).await?;
        }

        Command::Replay { files, at } => {
            let cfg = config::load_config()?;
            replay(&cfg, &files, at)?;
        }

        Command::Status { date, json } => {
            let cfg = config::load_config()?;
            status(&cfg, date, json)?;
        }

        Command::Mark { task, date, undo } => {
            let cfg = config::load_config()?;
            mark(&cfg, &task, date, undo)?;
        }
    }

    Ok(())
}

fn build_engine(cfg: &Config) -> Result<EventEngine> {
    let home = state::ensure_watcher_home()?;
    let triggers_path = state::resolve(&home, &cfg.paths.triggers);
    let triggers = TriggerConfig::load_or_default(&triggers_path);
    info!(
        start = triggers.start_triggers.len(),
        end = triggers.end_triggers.len(),
        "trigger rules loaded"
    );

    Ok(EventEngine::new(TriggerMatcher::new(triggers), open_ledger(cfg)?)
        .with_dedup_capacity(cfg.watch.dedup_capacity))
}

fn open_ledger(cfg: &Config) -> Result<TaskLedger> {
    let home = state::ensure_watcher_home()?;
    let ledger_path = state::resolve(&home, &cfg.paths.ledger);
    Ok(TaskLedger::open(default_catalog(), ledger_path))
}

fn timezone(cfg: &Config) -> Result<chrono_tz::Tz> {
    time::parse_timezone(&cfg.calendar.timezone).context("[calendar].timezone")
}

async fn watch_loop(cfg: &Config, source: Option<PathBuf>, interval: Option<u64>) -> Result<()> {
    let tz = timezone(cfg)?;
    let Some(source) = source.or_else(|| cfg.watch.source.as_ref().map(PathBuf::from)) else {
        bail!("No text source configured. Pass --source <file> or set [watch].source");
    };
    let interval = Duration::from_secs(interval.unwrap_or(cfg.watch.interval_secs).max(1));

    let engine = build_engine(cfg)?;
    if engine.matcher().config().is_empty() {
        warn!("no trigger rules; lines will be logged but nothing can complete");
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<EngineEvent>();
    let cancel = CancellationToken::new();

    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    println!("Watching {} every {}s (Ctrl-C to stop)", source.display(), interval.as_secs());
    let poller = Poller::new(
        TextFileSource::new(source),
        PassThrough,
        engine,
        Clock::Zone(tz),
        event_tx,
    )
    .with_interval(interval);

    let engine = poller.run(cancel).await?;
    // The poller owned the only sender; the printer drains and exits.
    finish_printer(printer).await;

    let now = time::local_now(tz);
    print_snapshot(&engine.ledger().snapshot(now));
    Ok(())
}

/// Wait for the printer to drain. Returns false (and logs) if it panicked or was aborted.
async fn finish_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "event printer task failed");
            false
        }
    }
}

fn replay(cfg: &Config, files: &[PathBuf], at: Option<NaiveDateTime>) -> Result<()> {
    let clock = match at {
        Some(at) => Clock::Fixed(at),
        None => Clock::Zone(timezone(cfg)?),
    };
    let mut engine = build_engine(cfg)?;

    for file in files {
        let text = read_text(file)?;
        let now = clock.now();
        println!("## {}", file.display());
        for event in engine.process(&text, now) {
            print_event(&event);
        }
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn status(cfg: &Config, date: Option<NaiveDate>, json: bool) -> Result<()> {
    let tz = timezone(cfg)?;
    let ledger = open_ledger(cfg)?;
    let now = time::local_now(tz);

    let snapshot = match date {
        Some(d) => ledger.snapshot_on(d),
        None => ledger.snapshot(now),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let eorzea = time::eorzea_time(Utc::now());
    match date {
        Some(d) => println!("# Duties on {d}"),
        None => println!(
            "# Duties at {} ({}) | ET {}",
            now.format("%Y-%m-%d %H:%M"),
            tz,
            eorzea.format("%H:%M")
        ),
    }
    print_snapshot(&snapshot);
    Ok(())
}

fn mark(cfg: &Config, query: &str, date: Option<NaiveDate>, undo: bool) -> Result<()> {
    let tz = timezone(cfg)?;
    let mut ledger = open_ledger(cfg)?;
    let now = time::local_now(tz);

    let Some(task) = ledger.find_task(query).cloned() else {
        bail!("Unknown task '{query}'. Run `watcher status` to list tasks");
    };

    let current = PeriodKey::current(task.reset, now);
    let period = date.map_or(current, |d| PeriodKey::on_date(task.reset, d));
    // Only a mark for the running period gets a real completion instant.
    let at = (period == current).then_some(now);

    ledger.set_status(&task.id, period, !undo, at);
    if let Some(path) = ledger.path() {
        ledger
            .save()
            .with_context(|| format!("write {}", path.display()))?;
    }

    println!(
        "{} {} ({}) for period {}",
        if undo { "Cleared" } else { "Marked" },
        task.name,
        task.id,
        period
    );
    Ok(())
}

fn print_event(event: &EngineEvent) {
    let stamp = chrono::Local::now().format("%H:%M:%S");
    match event {
        EngineEvent::LineAccepted { line } => println!("[{stamp}] [OCR] {line}"),
        EngineEvent::StartMatched { message, name, .. } => {
            println!("[{stamp}] [start] {message}");
            if let Some(name) = name {
                println!("[{stamp}] [info] duty: {name}");
            }
        }
        EngineEvent::EndMatched { message, .. } => println!("[{stamp}] [end] {message}"),
        EngineEvent::TaskCompleted {
            task_name, source, ..
        } => println!("[{stamp}] [done] {task_name} (matched via {source:?})"),
        EngineEvent::Unresolved { .. } => {
            println!("[{stamp}] [record] no task matched; mark it manually")
        }
    }
}

fn print_snapshot(snapshot: &[TaskSnapshot]) {
    for s in snapshot {
        let check = if s.done { "x" } else { " " };
        let when = s
            .completed_at
            .map(|at| format!(", done {}", at.format("%m-%d %H:%M")))
            .unwrap_or_default();
        println!(
            "- [{check}] {} ({}, period {}{when})",
            s.name, s.frequency, s.period
        );
    }
}
