use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::error::Result;

pub const CAPTURE_INTERVAL: Duration = Duration::from_secs(3 * 60);
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// The two jobs driven by the scheduler.
pub trait Cycle {
    fn capture(&mut self) -> Result<()>;

    /// Recency select, dedup and sync.
    fn maintain(&mut self) -> Result<()>;
}

/// Fixed-interval loop: capture every tick, maintenance whenever the long
/// interval has elapsed since the start of the last successful maintenance.
///
/// There is no retry inside a tick. A failed step is retried on the next one.
#[derive(Debug, Clone)]
pub struct Scheduler {
    capture_every: Duration,
    maintain_every: Duration,
    last_maintenance: Option<Instant>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(CAPTURE_INTERVAL, MAINTENANCE_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(capture_every: Duration, maintain_every: Duration) -> Self {
        Self {
            capture_every,
            maintain_every,
            last_maintenance: None,
        }
    }

    /// Start of the last maintenance that returned `Ok`.
    pub fn last_maintenance(&self) -> Option<Instant> {
        self.last_maintenance
    }

    pub fn maintenance_due(&self, now: Instant) -> bool {
        match self.last_maintenance {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.maintain_every,
        }
    }

    /// One tick. Errors from either job are logged and swallowed.
    pub fn run_iteration(&mut self, cycle: &mut dyn Cycle, started: Instant) {
        info!("Starting capture");
        if let Err(e) = cycle.capture() {
            error!("Capture failed: {e}");
        }

        if self.maintenance_due(started) {
            info!("Starting maintenance");
            match cycle.maintain() {
                Ok(()) => {
                    self.last_maintenance = Some(started);
                    info!("Maintenance complete");
                }
                Err(e) => error!("Maintenance failed: {e}"),
            }
        }
    }

    /// How long to sleep after a tick that took `elapsed`.
    pub fn sleep_after(&self, elapsed: Duration) -> Duration {
        self.capture_every.saturating_sub(elapsed)
    }

    /// Run forever.
    pub fn run(&mut self, cycle: &mut dyn Cycle) -> ! {
        info!(
            capture_secs = self.capture_every.as_secs(),
            maintenance_secs = self.maintain_every.as_secs(),
            "Scheduler started"
        );
        loop {
            let started = Instant::now();
            self.run_iteration(cycle, started);
            let pause = self.sleep_after(started.elapsed());
            info!(secs = pause.as_secs(), "Sleeping until next capture");
            thread::sleep(pause);
        }
    }
}
