use chrono::{DateTime, Utc};
use common::{AttemptId, ConnectionState, ContentKind, SessionSnapshot};
use uuid::Uuid;

use crate::catalog::StrategyCatalog;
use crate::classifier::RecoveryLedger;
use crate::scheduler::{TimerId, TimerKind};
use crate::watchdog::StallWatchdog;

/// Playback position as last reported by the sink
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaClock {
    pub current_time: f64,
    pub duration: Option<f64>,
}

impl MediaClock {
    /// Clamp a target position into the playable range
    pub fn clamp(&self, position: f64) -> f64 {
        let lower = position.max(0.0);
        match self.duration {
            Some(duration) if duration.is_finite() && duration > 0.0 => lower.min(duration),
            _ => lower,
        }
    }
}

/// Timers owned by a session, at most one per kind
#[derive(Debug, Default, Clone)]
pub struct SessionTimers {
    pub watchdog: Option<TimerId>,
    pub cooldown: Option<TimerId>,
    pub native_grace: Option<TimerId>,
    pub connect_timeout: Option<TimerId>,
}

impl SessionTimers {
    pub fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
        match kind {
            TimerKind::Watchdog => &mut self.watchdog,
            TimerKind::Cooldown => &mut self.cooldown,
            TimerKind::NativeGrace => &mut self.native_grace,
            TimerKind::ConnectTimeout => &mut self.connect_timeout,
        }
    }

    pub fn owns(&self, kind: TimerKind, id: TimerId) -> bool {
        let current = match kind {
            TimerKind::Watchdog => self.watchdog,
            TimerKind::Cooldown => self.cooldown,
            TimerKind::NativeGrace => self.native_grace,
            TimerKind::ConnectTimeout => self.connect_timeout,
        };
        current == Some(id)
    }

    /// Every live timer id, emptying the slots
    pub fn drain(&mut self) -> Vec<TimerId> {
        [
            self.watchdog.take(),
            self.cooldown.take(),
            self.native_grace.take(),
            self.connect_timeout.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// The live playback attempt for one target address
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub address: String,
    pub kind: ContentKind,
    pub state: ConnectionState,
    pub strategy_index: usize,
    pub retry_cycle_count: u32,
    pub reconnecting: bool,
    pub loading: bool,
    pub playing: bool,
    pub last_error: Option<String>,
    pub clock: MediaClock,
    /// Attachment currently owned by this session
    pub attempt: Option<AttemptId>,
    pub recovery: RecoveryLedger,
    pub watchdog: StallWatchdog,
    pub timers: SessionTimers,
}

impl Session {
    pub fn new(address: String, kind: ContentKind, watchdog: StallWatchdog) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            address,
            kind,
            state: ConnectionState::Idle,
            strategy_index: 0,
            retry_cycle_count: 0,
            reconnecting: false,
            loading: false,
            playing: false,
            last_error: None,
            clock: MediaClock::default(),
            attempt: None,
            recovery: RecoveryLedger::default(),
            watchdog,
            timers: SessionTimers::default(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attempt.is_some()
    }

    pub fn snapshot(&self, catalog: &StrategyCatalog, muted: bool) -> SessionSnapshot {
        let in_cooldown = self.state == ConnectionState::Cooldown;
        let (index, name) = if in_cooldown {
            (None, None)
        } else {
            (
                Some(self.strategy_index),
                catalog.get(self.strategy_index).map(|s| s.name.clone()),
            )
        };

        SessionSnapshot {
            session_id: Some(self.id),
            started_at: Some(self.started_at),
            address: Some(self.address.clone()),
            content_kind: Some(self.kind),
            state: self.state,
            loading: self.loading,
            playing: self.playing,
            reconnecting: self.reconnecting,
            retry_cycle_count: self.retry_cycle_count,
            current_strategy_index: index,
            current_strategy_name: name,
            last_error_message: self.last_error.clone(),
            current_time: self.clock.current_time,
            duration: self.clock.duration,
            muted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_clamp() {
        let live = MediaClock { current_time: 3.0, duration: None };
        assert_eq!(live.clamp(-4.0), 0.0);
        assert_eq!(live.clamp(1e6), 1e6);

        let movie = MediaClock { current_time: 3.0, duration: Some(120.0) };
        assert_eq!(movie.clamp(150.0), 120.0);
        assert_eq!(movie.clamp(60.0), 60.0);

        let unbounded = MediaClock { current_time: 0.0, duration: Some(f64::INFINITY) };
        assert_eq!(unbounded.clamp(500.0), 500.0);
    }

    #[test]
    fn test_timer_slots() {
        let mut timers = SessionTimers::default();
        *timers.slot(TimerKind::Cooldown) = Some(TimerId(7));

        assert!(timers.owns(TimerKind::Cooldown, TimerId(7)));
        assert!(!timers.owns(TimerKind::Cooldown, TimerId(8)));
        assert!(!timers.owns(TimerKind::Watchdog, TimerId(7)));

        *timers.slot(TimerKind::Watchdog) = Some(TimerId(9));
        let mut drained = timers.drain();
        drained.sort();
        assert_eq!(drained, vec![TimerId(7), TimerId(9)]);
        assert!(timers.cooldown.is_none());
    }

    #[test]
    fn test_snapshot_hides_strategy_during_cooldown() {
        let catalog = StrategyCatalog::default();
        let mut session = Session::new(
            "http://a/live".to_string(),
            ContentKind::Live,
            StallWatchdog::new(Duration::from_secs(5), 0.5),
        );
        session.state = ConnectionState::Connecting(2);
        session.strategy_index = 2;

        let snapshot = session.snapshot(&catalog, false);
        assert_eq!(snapshot.current_strategy_name.as_deref(), Some("Gateway-2"));

        session.state = ConnectionState::Cooldown;
        let snapshot = session.snapshot(&catalog, false);
        assert_eq!(snapshot.current_strategy_index, None);
        assert_eq!(snapshot.current_strategy_name, None);
    }
}
