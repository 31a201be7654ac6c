use common::{AttemptId, RecoveryResult, SinkError, SinkHealth, SinkSignal};
use tokio::sync::mpsc;

use crate::catalog::ResolvedAddress;
use crate::runtime::ControllerEvent;

/// The decode/render capability the controller drives.
///
/// Implementations never see strategies or retry policy, only resolved
/// addresses. Every signal must be tagged with the `AttemptId` passed to the
/// `attach` that produced it; the controller drops signals from any other
/// attempt.
pub trait PlaybackSink {
    /// Begin delivery. A synchronous error is treated like an unrecoverable
    /// failure of this attempt.
    fn attach(&mut self, attempt: AttemptId, target: &ResolvedAddress) -> Result<(), SinkError>;

    /// Release everything held by the current attachment. Must be complete
    /// when it returns: no timers, no decode resources, no further signals.
    fn detach(&mut self);

    /// Restart segment loading without reattaching
    fn resume_network_load(&mut self) -> RecoveryResult;

    /// Reset the decoder without reattaching
    fn recover_media_error(&mut self) -> RecoveryResult;

    /// Move the playback position forward by `delta_seconds`
    fn nudge(&mut self, delta_seconds: f64);

    fn seek(&mut self, position: f64);

    fn set_muted(&mut self, muted: bool);

    fn health(&self) -> SinkHealth;
}

/// Cloneable emitter a sink uses to report signals to the controller
#[derive(Debug, Clone)]
pub struct SignalSender {
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl SignalSender {
    pub fn new(events: mpsc::UnboundedSender<ControllerEvent>) -> Self {
        Self { events }
    }

    /// Returns false once the controller has shut down
    pub fn emit(&self, attempt: AttemptId, signal: SinkSignal) -> bool {
        self.events
            .send(ControllerEvent::Sink { attempt, signal })
            .is_ok()
    }
}

impl<S: PlaybackSink + ?Sized> PlaybackSink for Box<S> {
    fn attach(&mut self, attempt: AttemptId, target: &ResolvedAddress) -> Result<(), SinkError> {
        (**self).attach(attempt, target)
    }

    fn detach(&mut self) {
        (**self).detach()
    }

    fn resume_network_load(&mut self) -> RecoveryResult {
        (**self).resume_network_load()
    }

    fn recover_media_error(&mut self) -> RecoveryResult {
        (**self).recover_media_error()
    }

    fn nudge(&mut self, delta_seconds: f64) {
        (**self).nudge(delta_seconds)
    }

    fn seek(&mut self, position: f64) {
        (**self).seek(position)
    }

    fn set_muted(&mut self, muted: bool) {
        (**self).set_muted(muted)
    }

    fn health(&self) -> SinkHealth {
        (**self).health()
    }
}
