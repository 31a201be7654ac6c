use std::time::Duration;
use common::SinkHealth;
use tracing::debug;

/// Outcome of one watchdog inspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WatchdogVerdict {
    Healthy,
    /// Playback is silently stuck; push the position forward
    Stalled { advance_by: f64, consecutive: u32 },
}

/// Periodic health check that catches stalls the sink never reports as errors
#[derive(Debug, Clone)]
pub struct StallWatchdog {
    period: Duration,
    nudge_step: f64,
    consecutive_nudges: u32,
}

impl StallWatchdog {
    pub fn new(period: Duration, nudge_step: f64) -> Self {
        Self {
            period,
            nudge_step,
            consecutive_nudges: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn consecutive_nudges(&self) -> u32 {
        self.consecutive_nudges
    }

    /// A stall is an unpaused sink short of data while the controller still
    /// considers the attempt loading
    pub fn inspect(&mut self, health: SinkHealth, loading: bool) -> WatchdogVerdict {
        let stalled = !health.paused && health.ready_state.is_insufficient() && loading;

        if !stalled {
            if self.consecutive_nudges > 0 {
                debug!(nudges = self.consecutive_nudges, "Stall cleared");
            }
            self.consecutive_nudges = 0;
            return WatchdogVerdict::Healthy;
        }

        self.consecutive_nudges = self.consecutive_nudges.saturating_add(1);
        WatchdogVerdict::Stalled {
            advance_by: self.nudge_step,
            consecutive: self.consecutive_nudges,
        }
    }

    pub fn reset(&mut self) {
        self.consecutive_nudges = 0;
    }
}
