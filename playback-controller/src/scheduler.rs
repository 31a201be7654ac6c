use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::runtime::ControllerEvent;

/// What a timer is for; the controller owns at most one live timer per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Watchdog,
    Cooldown,
    NativeGrace,
    ConnectTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// One-shot timers delivered back to the controller as events.
///
/// `cancel` must be idempotent and accept ids that already fired.
pub trait TimerScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Timers backed by sleeping tokio tasks that post `TimerFired` into the
/// controller's event queue
pub struct TokioScheduler {
    events: mpsc::UnboundedSender<ControllerEvent>,
    next_id: u64,
    live: HashMap<TimerId, AbortHandle>,
}

impl TokioScheduler {
    pub fn new(events: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self {
            events,
            next_id: 0,
            live: HashMap::new(),
        }
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let events = self.events.clone();

        // finished tasks are dropped lazily here rather than on every fire
        self.live.retain(|_, handle| !handle.is_finished());

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // the receiver is gone once the service shut down
            let _ = events.send(ControllerEvent::TimerFired { id, kind });
        });

        debug!(%id, ?kind, ?after, "Timer scheduled");
        self.live.insert(id, handle.abort_handle());
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.live.remove(&id) {
            handle.abort();
            debug!(%id, "Timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.live.drain() {
            handle.abort();
        }
    }
}
