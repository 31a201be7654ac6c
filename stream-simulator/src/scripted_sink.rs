use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use common::{
    AttemptId, ReadyState, RecoveryError, RecoveryResult, SinkError, SinkErrorCategory,
    SinkHealth, SinkSignal,
};
use playback_controller::{PlaybackSink, ResolvedAddress, SignalSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::script::{Outcome, Script};

const STARTUP_DELAY: Duration = Duration::from_millis(400);
const FAILURE_DELAY: Duration = Duration::from_millis(600);
const RECOVERY_DELAY: Duration = Duration::from_millis(300);
const BUFFER_AFTER: Duration = Duration::from_secs(2);
const BUFFER_FOR: Duration = Duration::from_secs(3);
const TICK: Duration = Duration::from_secs(1);

/// One step of a scripted attempt
#[derive(Debug, Clone)]
enum Cue {
    Ready(ReadyState),
    Signal(SinkSignal),
    /// Report playback progress every tick until detached
    Tick,
}

#[derive(Debug)]
struct Playhead {
    ready_state: ReadyState,
    position: f64,
}

/// Playback sink that plays back a script instead of decoding media
pub struct ScriptedSink {
    signals: SignalSender,
    script: Script,
    attaches: usize,
    current: Option<(AttemptId, Outcome)>,
    playhead: Arc<Mutex<Playhead>>,
    tasks: Vec<JoinHandle<()>>,
}

fn lock(playhead: &Mutex<Playhead>) -> MutexGuard<'_, Playhead> {
    playhead.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedSink {
    pub fn new(signals: SignalSender, script: Script) -> Self {
        Self {
            signals,
            script,
            attaches: 0,
            current: None,
            playhead: Arc::new(Mutex::new(Playhead {
                ready_state: ReadyState::HaveNothing,
                position: 0.0,
            })),
            tasks: Vec::new(),
        }
    }

    fn cues_for(outcome: Outcome) -> Vec<(Duration, Cue)> {
        let started = vec![
            (STARTUP_DELAY, Cue::Ready(ReadyState::HaveEnoughData)),
            (Duration::ZERO, Cue::Signal(SinkSignal::Started)),
        ];

        match outcome {
            Outcome::Play => [started, vec![(Duration::ZERO, Cue::Tick)]].concat(),
            Outcome::Buffer => [
                started,
                vec![
                    (BUFFER_AFTER, Cue::Ready(ReadyState::HaveCurrentData)),
                    (Duration::ZERO, Cue::Signal(SinkSignal::Buffering)),
                    (BUFFER_FOR, Cue::Ready(ReadyState::HaveEnoughData)),
                    (Duration::ZERO, Cue::Signal(SinkSignal::Resumed)),
                    (Duration::ZERO, Cue::Tick),
                ],
            ]
            .concat(),
            Outcome::Stall => vec![(STARTUP_DELAY, Cue::Signal(SinkSignal::Buffering))],
            Outcome::FailNetwork | Outcome::RecoverNetwork => vec![(
                FAILURE_DELAY,
                Cue::Signal(Self::failure(SinkErrorCategory::Network)),
            )],
            Outcome::FailMedia => vec![(
                FAILURE_DELAY,
                Cue::Signal(Self::failure(SinkErrorCategory::Media)),
            )],
            Outcome::FailOther => vec![(
                FAILURE_DELAY,
                Cue::Signal(Self::failure(SinkErrorCategory::Other)),
            )],
            Outcome::Silent => Vec::new(),
        }
    }

    fn failure(category: SinkErrorCategory) -> SinkSignal {
        let detail = match category {
            SinkErrorCategory::Network => "segment request failed",
            SinkErrorCategory::Media => "fragment parsing error",
            SinkErrorCategory::Other => "manifest incompatible",
        };
        SinkSignal::Error(SinkError::fatal(category, detail))
    }

    fn run_cues(&mut self, attempt: AttemptId, cues: Vec<(Duration, Cue)>) {
        if cues.is_empty() {
            return;
        }
        let signals = self.signals.clone();
        let playhead = Arc::clone(&self.playhead);

        let task = tokio::spawn(async move {
            for (delay, cue) in cues {
                tokio::time::sleep(delay).await;
                match cue {
                    Cue::Ready(state) => lock(&playhead).ready_state = state,
                    Cue::Signal(signal) => {
                        if !signals.emit(attempt, signal) {
                            return;
                        }
                    }
                    Cue::Tick => loop {
                        tokio::time::sleep(TICK).await;
                        let position = {
                            let mut head = lock(&playhead);
                            head.position += TICK.as_secs_f64();
                            head.position
                        };
                        if !signals.emit(attempt, SinkSignal::TimeAdvanced(position)) {
                            return;
                        }
                    },
                }
            }
        });
        self.tasks.push(task);
    }

    fn current(&self) -> Result<(AttemptId, Outcome), RecoveryError> {
        self.current.ok_or(RecoveryError::NotAttached)
    }
}

impl PlaybackSink for ScriptedSink {
    fn attach(&mut self, attempt: AttemptId, target: &ResolvedAddress) -> Result<(), SinkError> {
        let outcome = self.script.outcome_for(self.attaches);
        self.attaches += 1;
        self.current = Some((attempt, outcome));
        {
            let mut head = lock(&self.playhead);
            head.ready_state = ReadyState::HaveNothing;
            head.position = 0.0;
        }

        info!(
            %attempt,
            strategy = %target.strategy_name,
            mode = ?target.mode,
            %outcome,
            address = %target.address,
            "Scripted attach"
        );
        self.run_cues(attempt, Self::cues_for(outcome));
        Ok(())
    }

    fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some((attempt, _)) = self.current.take() {
            debug!(%attempt, "Scripted detach");
        }
        lock(&self.playhead).ready_state = ReadyState::HaveNothing;
    }

    fn resume_network_load(&mut self) -> RecoveryResult {
        let (attempt, outcome) = self.current()?;
        let cues = match outcome {
            Outcome::FailNetwork => vec![(
                FAILURE_DELAY,
                Cue::Signal(Self::failure(SinkErrorCategory::Network)),
            )],
            Outcome::RecoverNetwork => vec![
                (RECOVERY_DELAY, Cue::Ready(ReadyState::HaveEnoughData)),
                (Duration::ZERO, Cue::Signal(SinkSignal::Started)),
                (Duration::ZERO, Cue::Tick),
            ],
            _ => Vec::new(),
        };
        debug!(%attempt, %outcome, "Resuming network load");
        self.run_cues(attempt, cues);
        Ok(())
    }

    fn recover_media_error(&mut self) -> RecoveryResult {
        let (attempt, outcome) = self.current()?;
        if outcome == Outcome::FailMedia {
            self.run_cues(
                attempt,
                vec![(FAILURE_DELAY, Cue::Signal(Self::failure(SinkErrorCategory::Media)))],
            );
        }
        debug!(%attempt, %outcome, "Recovering media error");
        Ok(())
    }

    fn nudge(&mut self, delta_seconds: f64) {
        let mut head = lock(&self.playhead);
        head.position += delta_seconds;
        debug!(position = head.position, "Nudged");
    }

    fn seek(&mut self, position: f64) {
        lock(&self.playhead).position = position;
    }

    fn set_muted(&mut self, muted: bool) {
        debug!(muted, "Mute changed");
    }

    fn health(&self) -> SinkHealth {
        SinkHealth {
            paused: false,
            ready_state: lock(&self.playhead).ready_state,
        }
    }
}

impl Drop for ScriptedSink {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
