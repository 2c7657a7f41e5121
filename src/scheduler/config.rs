//! Scheduler configuration.

/// Warm-up ticks before the group selection is requested.
pub const DEFAULT_WARMUP_TICKS: u32 = 5;

/// Run-level knobs of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Idle ticks after `init()` before the selection request goes out, giving the console time
    /// to connect.
    pub warmup_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            warmup_ticks: DEFAULT_WARMUP_TICKS,
        }
    }
}

impl SchedulerConfig {
    pub fn with_warmup_ticks(mut self, ticks: u32) -> Self {
        self.warmup_ticks = ticks;
        self
    }
}
