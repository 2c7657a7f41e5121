//! Time sources for timed tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source. `now()` is the time elapsed since some fixed origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock monotonic time ([`Instant`]).
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock advanced by hand. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Stopwatch over a [`Clock`], restarted by timed tests in `setup()`.
///
/// Restarting only needs `&self` so phase end conditions can share the stopwatch.
pub(crate) struct Stopwatch {
    clock: Box<dyn Clock>,
    started: Cell<Duration>,
}

impl Stopwatch {
    pub(crate) fn new(clock: Box<dyn Clock>) -> Self {
        let started = Cell::new(clock.now());
        Self { clock, started }
    }

    pub(crate) fn restart(&self) {
        self.started.set(self.clock.now());
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started.get())
    }
}
