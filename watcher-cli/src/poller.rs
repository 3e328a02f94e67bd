use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use chrono_tz::Tz;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watcher_core::{EngineEvent, EventEngine, FrameSource, Recognizer, Region, time};

/// Where "now" comes from for each iteration.
pub enum Clock {
    Zone(Tz),
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::Zone(tz) => time::local_now(*tz),
            Clock::Fixed(at) => *at,
        }
    }
}

/// Single-worker polling loop: capture -> recognize -> engine -> notify -> sleep.
///
/// The engine is only touched from this loop. Presentation gets engine events
/// through `events`.
pub struct Poller<S, R>
where
    S: FrameSource,
    R: Recognizer<S::Image>,
{
    source: S,
    recognizer: R,
    engine: EventEngine,
    interval: Duration,
    clock: Clock,
    events: mpsc::UnboundedSender<EngineEvent>,
    last_region: Option<Region>,
}

impl<S, R> Poller<S, R>
where
    S: FrameSource,
    R: Recognizer<S::Image>,
{
    pub fn new(
        source: S,
        recognizer: R,
        engine: EventEngine,
        clock: Clock,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            source,
            recognizer,
            engine,
            interval: Duration::from_secs(3),
            clock,
            events,
            last_region: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until `cancel` fires.
    ///
    /// Recognizer init failure aborts the loop; it is not retried. Capture and
    /// recognition failures skip one iteration. A recognize call already in
    /// flight always runs to completion before cancellation is observed.
    ///
    /// On a multi-thread runtime each iteration runs under `block_in_place`,
    /// so slow recognition does not stall other tasks on the same worker.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<EventEngine> {
        self.recognizer
            .init()
            .context("recognition engine failed to initialize")?;
        info!(interval = ?self.interval, "watch loop started");

        let multi_thread = Handle::current().runtime_flavor() == RuntimeFlavor::MultiThread;

        while !cancel.is_cancelled() {
            if multi_thread {
                tokio::task::block_in_place(|| self.tick());
            } else {
                self.tick();
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("watch loop stopped");
        Ok(self.engine)
    }

    /// One iteration. Returns the number of events emitted.
    pub fn tick(&mut self) -> usize {
        let frame = match self.source.capture_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("nothing to capture");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "capture failed; skipping iteration");
                return 0;
            }
        };

        if frame.region != self.last_region {
            if self.last_region.is_some() {
                info!(region = ?frame.region, "capture region changed; forgetting seen lines");
            }
            self.engine.reset_dedup();
            self.last_region = frame.region;
        }

        let text = match self.recognizer.recognize(&frame.image) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "recognition failed; skipping iteration");
                return 0;
            }
        };
        if text.trim().is_empty() {
            return 0;
        }

        let events = self.engine.process(&text, self.clock.now());
        let count = events.len();
        for event in events {
            if self.events.send(event).is_err() {
                debug!("event consumer gone");
                break;
            }
        }
        count
    }
}
