//! Deterministic doubles for the controller's collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use common::{
    AttemptId, DeliveryMode, ReadyState, RecoveryError, RecoveryResult, SinkError, SinkHealth,
    SinkSignal,
};

use crate::catalog::ResolvedAddress;
use crate::config::ControllerConfig;
use crate::controller::ConnectionController;
use crate::errors::Result;
use crate::external::ExternalOpener;
use crate::scheduler::{TimerId, TimerKind, TimerScheduler};
use crate::sink::{PlaybackSink, SignalSender};

/// Timers that only fire when a test says so
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Vec<(TimerId, TimerKind, Duration)>,
    cancelled: Vec<TimerId>,
}

impl ManualScheduler {
    /// Most recently scheduled live timer of `kind`
    pub fn pending(&self, kind: TimerKind) -> Option<TimerId> {
        self.pending
            .iter()
            .rev()
            .find(|(_, k, _)| *k == kind)
            .map(|(id, _, _)| *id)
    }

    pub fn delay_of(&self, id: TimerId) -> Option<Duration> {
        self.pending
            .iter()
            .find(|(pending, _, _)| *pending == id)
            .map(|(_, _, after)| *after)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn was_cancelled(&self, id: TimerId) -> bool {
        self.cancelled.contains(&id)
    }

    /// Remove the live timer of `kind` as if it just fired
    pub fn take(&mut self, kind: TimerKind) -> Option<TimerId> {
        let id = self.pending(kind)?;
        self.pending.retain(|(pending, _, _)| *pending != id);
        Some(id)
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.push((id, kind, after));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        let before = self.pending.len();
        self.pending.retain(|(pending, _, _)| *pending != id);
        if self.pending.len() != before {
            self.cancelled.push(id);
        }
    }
}

/// Fire the live timer of `kind`; false when none is pending
pub fn fire<S: PlaybackSink>(
    controller: &mut ConnectionController<S, ManualScheduler>,
    kind: TimerKind,
) -> bool {
    match controller.scheduler_mut().take(kind) {
        Some(id) => {
            controller.handle_timer(id, kind);
            true
        }
        None => false,
    }
}

/// One outbound call made by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Attach {
        attempt: AttemptId,
        index: usize,
        address: String,
        mode: DeliveryMode,
    },
    Detach,
    ResumeNetworkLoad,
    RecoverMediaError,
    Nudge(f64),
    Seek(f64),
    SetMuted(bool),
}

#[derive(Debug)]
struct SinkState {
    calls: Vec<SinkCall>,
    health: SinkHealth,
    fail_recovery: bool,
    fail_attach: bool,
    /// Signals emitted after each attach, consumed in order, last one repeats
    responses: VecDeque<Vec<SinkSignal>>,
}

/// Sink that records calls and optionally answers attaches with canned signals.
///
/// Clones share state, so a test can keep one while the controller owns
/// another.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    state: Arc<Mutex<SinkState>>,
    signals: Option<SignalSender>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                calls: Vec::new(),
                health: SinkHealth {
                    paused: false,
                    ready_state: ReadyState::HaveEnoughData,
                },
                fail_recovery: false,
                fail_attach: false,
                responses: VecDeque::new(),
            })),
            signals: None,
        }
    }

    /// A sink that answers the n-th attach with the n-th response
    pub fn responsive(signals: SignalSender, responses: Vec<Vec<SinkSignal>>) -> Self {
        let sink = Self {
            signals: Some(signals),
            ..Self::new()
        };
        sink.lock().responses = responses.into();
        sink
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Strategy indices attached, in order
    pub fn attached_indices(&self) -> Vec<usize> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SinkCall::Attach { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&SinkCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn set_health(&self, paused: bool, ready_state: ReadyState) {
        self.lock().health = SinkHealth { paused, ready_state };
    }

    pub fn set_fail_recovery(&self, fail: bool) {
        self.lock().fail_recovery = fail;
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.lock().fail_attach = fail;
    }

    fn recovery_outcome(&self, call: SinkCall) -> RecoveryResult {
        let mut state = self.lock();
        state.calls.push(call);
        if state.fail_recovery {
            Err(RecoveryError::Failed("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackSink for RecordingSink {
    fn attach(&mut self, attempt: AttemptId, target: &ResolvedAddress) -> std::result::Result<(), SinkError> {
        let response = {
            let mut state = self.lock();
            state.calls.push(SinkCall::Attach {
                attempt,
                index: target.strategy_index,
                address: target.address.clone(),
                mode: target.mode,
            });
            if state.fail_attach {
                return Err(SinkError::fatal(common::SinkErrorCategory::Other, "attach refused"));
            }
            if state.responses.len() > 1 {
                state.responses.pop_front()
            } else {
                state.responses.front().cloned()
            }
        };

        if let (Some(signals), Some(response)) = (&self.signals, response) {
            for signal in response {
                signals.emit(attempt, signal);
            }
        }
        Ok(())
    }

    fn detach(&mut self) {
        self.lock().calls.push(SinkCall::Detach);
    }

    fn resume_network_load(&mut self) -> RecoveryResult {
        self.recovery_outcome(SinkCall::ResumeNetworkLoad)
    }

    fn recover_media_error(&mut self) -> RecoveryResult {
        self.recovery_outcome(SinkCall::RecoverMediaError)
    }

    fn nudge(&mut self, delta_seconds: f64) {
        self.lock().calls.push(SinkCall::Nudge(delta_seconds));
    }

    fn seek(&mut self, position: f64) {
        self.lock().calls.push(SinkCall::Seek(position));
    }

    fn set_muted(&mut self, muted: bool) {
        self.lock().calls.push(SinkCall::SetMuted(muted));
    }

    fn health(&self) -> SinkHealth {
        self.lock().health
    }
}

/// Opener that remembers what it was asked to open
#[derive(Debug, Clone, Default)]
pub struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

impl ExternalOpener for RecordingOpener {
    fn open(&self, address: &str) -> Result<()> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(address.to_string());
        }
        Ok(())
    }
}

/// Controller over the standard catalog with manual timers and a recording sink
pub fn manual_controller(
    config: &ControllerConfig,
) -> (ConnectionController<RecordingSink, ManualScheduler>, RecordingSink) {
    let sink = RecordingSink::new();
    let controller = ConnectionController::new(config, sink.clone(), ManualScheduler::default())
        .expect("valid test configuration");
    (controller, sink)
}
