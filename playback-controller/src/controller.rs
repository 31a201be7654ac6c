use std::collections::VecDeque;
use std::time::Duration;

use common::{
    AttemptId, ConnectionState, ContentKind, DeliveryMode, FailureKind, SessionSnapshot,
    SinkError, SinkSignal,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address;
use crate::catalog::StrategyCatalog;
use crate::classifier::{classify, RecoveryAction};
use crate::config::{ControllerConfig, EnvironmentConfig, TimingConfig};
use crate::errors::{ControllerError, Result};
use crate::scheduler::{TimerId, TimerKind, TimerScheduler};
use crate::session::Session;
use crate::sink::PlaybackSink;
use crate::watchdog::{StallWatchdog, WatchdogVerdict};

/// Entries kept in the transition history
pub const TRANSITION_LOG_CAPACITY: usize = 128;

/// The connection state machine.
///
/// Owns the playback sink and the timer scheduler; every input (caller
/// request, sink signal, timer firing) is a method call that runs to
/// completion, so the session is never observed half updated.
pub struct ConnectionController<S, T> {
    timing: TimingConfig,
    environment: EnvironmentConfig,
    catalog: StrategyCatalog,
    sink: S,
    scheduler: T,
    session: Option<Session>,
    next_attempt: u64,
    muted: bool,
    transitions: VecDeque<ConnectionState>,
}

impl<S: PlaybackSink, T: TimerScheduler> ConnectionController<S, T> {
    pub fn new(config: &ControllerConfig, sink: S, scheduler: T) -> Result<Self> {
        config.validate()?;
        let catalog = StrategyCatalog::standard(&config.gateways);
        Ok(Self::with_catalog(config, catalog, sink, scheduler))
    }

    /// Controller over a custom catalog; the configured gateways are ignored
    pub fn with_catalog(
        config: &ControllerConfig,
        catalog: StrategyCatalog,
        sink: S,
        scheduler: T,
    ) -> Self {
        Self {
            timing: config.timing.clone(),
            environment: config.environment.clone(),
            catalog,
            sink,
            scheduler,
            session: None,
            next_attempt: 0,
            muted: false,
            transitions: VecDeque::with_capacity(TRANSITION_LOG_CAPACITY),
        }
    }

    // ---- caller requests ----

    /// Start playing `address`, discarding any previous session.
    /// `kind` only steers the single-file native shortcut.
    pub fn play(&mut self, address: &str, kind: ContentKind) -> Result<Uuid> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ControllerError::InvalidAddress(address.to_string()));
        }

        self.end_session();

        let watchdog = StallWatchdog::new(self.timing.watchdog_period, self.timing.nudge_step_secs);
        let session = Session::new(address.to_string(), kind, watchdog);
        let id = session.id;
        info!(session = %id, %kind, address, "Starting playback session");
        self.session = Some(session);

        self.arm_timer(TimerKind::Watchdog, self.timing.watchdog_period);
        let entry = self.entry_index(address, kind);
        self.enter_connecting(entry);

        Ok(id)
    }

    /// Tear the session down; the controller returns to idle
    pub fn stop(&mut self) {
        if self.end_session() {
            self.transitions_push(ConnectionState::Idle);
        }
    }

    /// Abandon the current attempt (or cooldown) and start a fresh cycle
    pub fn force_retry(&mut self) -> Result<()> {
        let session = self.session.as_mut().ok_or(ControllerError::NoActiveSession)?;
        session.reconnecting = true;
        session.retry_cycle_count = 0;
        let (address, kind) = (session.address.clone(), session.kind);
        info!(session = %session.id, "Forced retry requested");

        self.disarm_timer(TimerKind::Cooldown);
        self.teardown_attempt();
        self.transition(ConnectionState::Reconnecting);

        if let Some(session) = self.session.as_mut() {
            session.reconnecting = false;
        }
        let entry = self.entry_index(&address, kind);
        self.enter_connecting(entry);
        Ok(())
    }

    /// Mute preference, kept across sessions and applied on every attach
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if self.is_attached() {
            self.sink.set_muted(muted);
        }
    }

    /// Seek to an absolute position; returns the position actually applied
    pub fn seek_to(&mut self, position: f64) -> Result<f64> {
        if !position.is_finite() || position < 0.0 {
            return Err(ControllerError::InvalidSeekPosition(position));
        }
        self.apply_seek(position)
    }

    /// Seek relative to the current position, clamped to the playable range
    pub fn adjust_time(&mut self, delta_seconds: f64) -> Result<f64> {
        if !delta_seconds.is_finite() {
            return Err(ControllerError::InvalidSeekPosition(delta_seconds));
        }
        let current = self
            .session
            .as_ref()
            .ok_or(ControllerError::NoActiveSession)?
            .clock
            .current_time;
        self.apply_seek(current + delta_seconds)
    }

    fn apply_seek(&mut self, position: f64) -> Result<f64> {
        let session = self.session.as_mut().ok_or(ControllerError::NoActiveSession)?;
        let target = session.clock.clamp(position);
        session.clock.current_time = target;
        if session.is_attached() {
            self.sink.seek(target);
        }
        debug!(session = %session.id, requested = position, target, "Seek applied");
        Ok(target)
    }

    // ---- inbound events ----

    /// Process a signal from the sink. Signals from any attempt other than
    /// the current one are dropped.
    pub fn handle_signal(&mut self, attempt: AttemptId, signal: SinkSignal) {
        let Some(session) = self.session.as_mut() else {
            debug!(%attempt, ?signal, "Ignoring sink signal without a session");
            return;
        };
        if session.attempt != Some(attempt) {
            debug!(%attempt, current = ?session.attempt, ?signal, "Ignoring signal from superseded attempt");
            return;
        }

        match signal {
            SinkSignal::Started | SinkSignal::Resumed => self.enter_playing(),
            SinkSignal::Buffering => {
                session.loading = true;
                self.transition(ConnectionState::Buffering);
            }
            SinkSignal::Paused => {
                session.playing = false;
            }
            SinkSignal::DurationKnown(duration) => {
                session.clock.duration = (duration.is_finite() && duration > 0.0).then_some(duration);
            }
            SinkSignal::TimeAdvanced(time) => {
                if time.is_finite() && time >= 0.0 {
                    session.clock.current_time = time;
                }
            }
            SinkSignal::Error(error) => self.on_error(error),
        }
    }

    /// Process a fired timer. Only the timer currently owned for `kind` acts.
    pub fn handle_timer(&mut self, id: TimerId, kind: TimerKind) {
        let Some(session) = self.session.as_mut() else {
            debug!(%id, ?kind, "Ignoring timer without a session");
            return;
        };
        if !session.timers.owns(kind, id) {
            debug!(%id, ?kind, "Ignoring stale timer");
            return;
        }
        *session.timers.slot(kind) = None;

        match kind {
            TimerKind::Watchdog => self.on_watchdog(),
            TimerKind::Cooldown => self.finish_cooldown(),
            TimerKind::NativeGrace => {
                warn!(session = %session.id, index = session.strategy_index, "Native playback did not start within grace");
                self.escalate(FailureKind::MediaDecodeFailure);
            }
            TimerKind::ConnectTimeout => self.on_connect_timeout(),
        }
    }

    // ---- observables ----

    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.session {
            Some(session) => session.snapshot(&self.catalog, self.muted),
            None => SessionSnapshot::idle(self.muted),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or(ConnectionState::Idle)
    }

    /// Most recent states entered, oldest first
    pub fn transitions(&self) -> &VecDeque<ConnectionState> {
        &self.transitions
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.session.as_ref().and_then(|session| session.attempt)
    }

    pub fn address(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.address.as_str())
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn scheduler(&self) -> &T {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut T {
        &mut self.scheduler
    }

    /// Strategy a fresh cycle starts from for `address`.
    ///
    /// The native path is chosen when adaptive delivery is unavailable, or
    /// when `prefer_native_for_files` is set and on-demand content is a single
    /// media file. Otherwise Direct is skipped when the host only allows
    /// secure transport and the address is insecure.
    pub fn entry_index(&self, address: &str, kind: ContentKind) -> usize {
        let env = &self.environment;
        if let Some(native) = self.catalog.first_direct_index() {
            let single_file = env.prefer_native_for_files
                && kind.is_on_demand()
                && address::is_progressive_file(address);
            if !env.adaptive_supported || single_file {
                return native;
            }
        }
        if env.requires_secure_transport && address::is_insecure(address) && self.catalog.len() > 1 {
            return 1;
        }
        0
    }

    // ---- state machine ----

    fn enter_connecting(&mut self, index: usize) {
        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.strategy_index = index;
        session.loading = true;
        session.playing = false;
        session.recovery.clear();
        session.watchdog.reset();
        session.attempt = Some(attempt);
        let address = session.address.clone();
        let session_id = session.id;
        let cycle = session.retry_cycle_count;
        self.transition(ConnectionState::Connecting(index));

        let Some(target) = self.catalog.resolve(index, &address) else {
            warn!(session = %session_id, index, "Strategy index outside catalog");
            self.enter_cooldown();
            return;
        };

        info!(
            session = %session_id,
            strategy = %target.strategy_name,
            index,
            cycle,
            %attempt,
            mode = ?target.mode,
            target = %target.address,
            "Attaching sink"
        );

        match self.sink.attach(attempt, &target) {
            Ok(()) => {
                self.sink.set_muted(self.muted);
                if let Some(timeout) = self.timing.connect_timeout {
                    self.arm_timer(TimerKind::ConnectTimeout, timeout);
                }
            }
            Err(error) => {
                warn!(session = %session_id, strategy = %target.strategy_name, index, %error, "Sink rejected attach");
                self.record_error(&error);
                self.escalate(FailureKind::UnrecoverableFailure);
            }
        }
    }

    fn enter_playing(&mut self) {
        self.disarm_timer(TimerKind::NativeGrace);
        self.disarm_timer(TimerKind::ConnectTimeout);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.loading = false;
        session.playing = true;
        session.last_error = None;
        session.recovery.clear();
        session.watchdog.reset();

        if session.state != ConnectionState::Playing {
            self.transition(ConnectionState::Playing);
        }
    }

    fn on_error(&mut self, error: SinkError) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let index = session.strategy_index;
        let session_id = session.id;
        let mode = self
            .catalog
            .get(index)
            .map(|strategy| strategy.mode)
            .unwrap_or(DeliveryMode::Adaptive);
        let verdict = classify(&error, mode, &session.recovery);

        match verdict.action {
            RecoveryAction::Ignore => {
                debug!(session = %session_id, index, %error, "Non-fatal sink error");
            }
            RecoveryAction::ResumeNetworkLoad | RecoveryAction::RecoverMediaError => {
                session.recovery.record(error.category);
                session.last_error = Some(error.detail.clone());
                warn!(
                    session = %session_id,
                    index,
                    failure = ?verdict.failure,
                    action = ?verdict.action,
                    %error,
                    "Recovering in place"
                );

                let outcome = if verdict.action == RecoveryAction::ResumeNetworkLoad {
                    self.sink.resume_network_load()
                } else {
                    self.sink.recover_media_error()
                };
                if let Err(recovery_error) = outcome {
                    warn!(session = %session_id, index, %recovery_error, "In-place recovery failed");
                    self.escalate(verdict.failure);
                }
            }
            RecoveryAction::Escalate => {
                session.last_error = Some(error.detail.clone());
                warn!(session = %session_id, index, failure = ?verdict.failure, %error, "Unrecoverable on this strategy");
                self.escalate(verdict.failure);
            }
            RecoveryAction::EscalateAfterGrace => {
                session.last_error = Some(error.detail.clone());
                if session.timers.native_grace.is_none() {
                    warn!(session = %session_id, index, %error, "Native decode error, waiting out grace");
                    self.arm_timer(TimerKind::NativeGrace, self.timing.native_grace);
                } else {
                    debug!(session = %session_id, index, %error, "Native decode error during grace");
                }
            }
        }
    }

    fn on_connect_timeout(&mut self) {
        let Some(attempt) = self.current_attempt() else {
            return;
        };
        let budget = self.timing.connect_timeout.unwrap_or_default();
        self.on_error(SinkError::timeout(format!(
            "No playback within {}ms",
            budget.as_millis()
        )));

        // the attempt survived an in-place resume, give it another budget
        let still_waiting = self.session.as_ref().is_some_and(|session| {
            session.attempt == Some(attempt)
                && !session.playing
                && session.timers.connect_timeout.is_none()
        });
        if still_waiting && !budget.is_zero() {
            self.arm_timer(TimerKind::ConnectTimeout, budget);
        }
    }

    fn on_watchdog(&mut self) {
        self.arm_timer(TimerKind::Watchdog, self.timing.watchdog_period);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_attached() {
            return;
        }

        let health = self.sink.health();
        let WatchdogVerdict::Stalled {
            advance_by,
            consecutive,
        } = session.watchdog.inspect(health, session.loading)
        else {
            return;
        };

        let index = session.strategy_index;
        warn!(
            session = %session.id,
            index,
            failure = ?FailureKind::StallDetected,
            consecutive,
            ready_state = ?health.ready_state,
            "Playback stalled, nudging"
        );
        self.transition(ConnectionState::Stalled);

        self.sink.nudge(advance_by);
        let adaptive = self
            .catalog
            .get(index)
            .is_some_and(|strategy| strategy.mode == DeliveryMode::Adaptive);
        if adaptive {
            if let Err(error) = self.sink.recover_media_error() {
                debug!(index, %error, "Decoder reset during nudge failed");
            }
        }
    }

    fn escalate(&mut self, failure: FailureKind) {
        self.teardown_attempt();
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let index = session.strategy_index;
        let last = self.catalog.last_index();
        info!(session = %session.id, index, ?failure, exhausted = index >= last, "Escalating");
        self.transition(ConnectionState::Escalating);

        if index < last {
            self.enter_connecting(index + 1);
        } else {
            self.enter_cooldown();
        }
    }

    fn enter_cooldown(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.reconnecting = true;
        session.loading = false;
        session.playing = false;
        warn!(
            session = %session.id,
            cycle = session.retry_cycle_count,
            delay_ms = self.timing.cooldown_delay.as_millis() as u64,
            "All strategies exhausted, cooling down"
        );
        self.transition(ConnectionState::Cooldown);
        self.arm_timer(TimerKind::Cooldown, self.timing.cooldown_delay);
    }

    fn finish_cooldown(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.retry_cycle_count += 1;
        session.reconnecting = false;
        let (address, kind) = (session.address.clone(), session.kind);
        info!(session = %session.id, cycle = session.retry_cycle_count, "Cooldown over, restarting cycle");

        let entry = self.entry_index(&address, kind);
        self.enter_connecting(entry);
    }

    /// Detach the current attempt and cancel the timers bound to it.
    /// Completes before any new attach.
    fn teardown_attempt(&mut self) {
        self.disarm_timer(TimerKind::NativeGrace);
        self.disarm_timer(TimerKind::ConnectTimeout);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.loading = false;
        session.playing = false;
        if let Some(attempt) = session.attempt.take() {
            debug!(session = %session.id, %attempt, "Detaching sink");
            self.sink.detach();
        }
    }

    /// Returns whether a session existed
    fn end_session(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        for id in session.timers.drain() {
            self.scheduler.cancel(id);
        }
        if session.attempt.take().is_some() {
            self.sink.detach();
        }
        info!(session = %session.id, cycle = session.retry_cycle_count, "Playback session ended");
        true
    }

    fn record_error(&mut self, error: &SinkError) {
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(error.detail.clone());
        }
    }

    fn transition(&mut self, state: ConnectionState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let previous = session.state;
        session.state = state;
        info!(
            session = %session.id,
            from = %previous,
            to = %state,
            cycle = session.retry_cycle_count,
            "Connection state changed"
        );
        self.transitions_push(state);
    }

    fn transitions_push(&mut self, state: ConnectionState) {
        if self.transitions.len() == TRANSITION_LOG_CAPACITY {
            self.transitions.pop_front();
        }
        self.transitions.push_back(state);
    }

    fn is_attached(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_attached)
    }

    fn arm_timer(&mut self, kind: TimerKind, after: Duration) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(previous) = session.timers.slot(kind).take() {
            self.scheduler.cancel(previous);
        }
        let id = self.scheduler.schedule(kind, after);
        *session.timers.slot(kind) = Some(id);
    }

    fn disarm_timer(&mut self, kind: TimerKind) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(id) = session.timers.slot(kind).take() {
            self.scheduler.cancel(id);
        }
    }
}
