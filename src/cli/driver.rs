//! Fixed-period host loop for the scheduler.
//!
//! Stands in for the controller's own periodic callback: tick, sleep until the next period,
//! repeat until the results have been handed to the console.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::link::Console;
use crate::scheduler::{Scheduler, SchedulerResult};

/// Loop timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Time between ticks.
    pub period: Duration,
    /// Stop after this many ticks even if the run has not finished.
    pub max_ticks: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20),
            max_ticks: None,
        }
    }
}

impl DriverConfig {
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }
}

/// How a driven run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Results were published.
    Finished { ticks: u64 },
    /// `max_ticks` was reached first.
    TickLimit { ticks: u64 },
}

/// Tick until the results are out, a fatal error occurs, or the tick limit is hit.
///
/// Link errors are logged (once per distinct message) and the run continues; the scheduler retries
/// them itself.
pub fn drive<C: Console>(scheduler: &mut Scheduler<C>, config: &DriverConfig) -> SchedulerResult<DriveOutcome> {
    let mut ticks = 0u64;
    let mut last_warning: Option<String> = None;
    let mut next = Instant::now();

    loop {
        if config.max_ticks.is_some_and(|limit| ticks >= limit) {
            return Ok(DriveOutcome::TickLimit { ticks });
        }

        ticks += 1;
        match scheduler.tick() {
            Ok(()) => {}
            Err(err) if !err.is_fatal() => {
                let message = err.to_string();
                if last_warning.as_deref() != Some(message.as_str()) {
                    warn!(error = %message, "tick did not complete; retrying");
                    last_warning = Some(message);
                }
            }
            Err(err) => return Err(err),
        }

        if scheduler.is_finished() && !scheduler.publication_pending() {
            return Ok(DriveOutcome::Finished { ticks });
        }

        next += config.period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }
}
