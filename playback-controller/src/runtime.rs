use common::{AttemptId, ContentKind, SessionSnapshot, SinkSignal};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ControllerConfig;
use crate::controller::ConnectionController;
use crate::errors::{ControllerError, Result};
use crate::external::ExternalOpener;
use crate::scheduler::{TimerId, TimerKind, TokioScheduler};
use crate::sink::{PlaybackSink, SignalSender};

/// Everything the service task reacts to, in arrival order
#[derive(Debug)]
pub enum ControllerEvent {
    Command(ControllerCommand),
    Sink { attempt: AttemptId, signal: SinkSignal },
    TimerFired { id: TimerId, kind: TimerKind },
}

/// Caller requests; each carries the channel its outcome is sent back on
#[derive(Debug)]
pub enum ControllerCommand {
    Play {
        address: String,
        kind: ContentKind,
        reply: oneshot::Sender<Result<Uuid>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    ForceRetry {
        reply: oneshot::Sender<Result<()>>,
    },
    SetMuted {
        muted: bool,
        reply: oneshot::Sender<()>,
    },
    SeekTo {
        position: f64,
        reply: oneshot::Sender<Result<f64>>,
    },
    AdjustTime {
        delta_seconds: f64,
        reply: oneshot::Sender<Result<f64>>,
    },
    OpenExternally {
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Runs a `ConnectionController` on a single tokio task
pub struct PlaybackService;

impl PlaybackService {
    /// Build the sink with a `SignalSender` wired to the service queue and
    /// start the event loop. Must be called inside a tokio runtime.
    pub fn spawn<S, F, O>(config: ControllerConfig, build_sink: F, opener: O) -> Result<PlaybackHandle>
    where
        S: PlaybackSink + Send + 'static,
        F: FnOnce(SignalSender) -> S,
        O: ExternalOpener + 'static,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let sink = build_sink(SignalSender::new(events_tx.clone()));
        let scheduler = TokioScheduler::new(events_tx.clone());
        let controller = ConnectionController::new(&config, sink, scheduler)?;

        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        tokio::spawn(run(controller, events_rx, snapshot_tx, opener));

        Ok(PlaybackHandle {
            events: events_tx,
            snapshots: snapshot_rx,
        })
    }
}

async fn run<S, O>(
    mut controller: ConnectionController<S, TokioScheduler>,
    mut events: mpsc::UnboundedReceiver<ControllerEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
    opener: O,
) where
    S: PlaybackSink,
    O: ExternalOpener,
{
    info!("Playback service started");

    loop {
        // timers and the sink hold queue senders, so the queue alone never
        // closes; the last handle or subscriber going away ends the service
        let event = tokio::select! {
            event = events.recv() => event,
            _ = snapshots.closed() => {
                debug!("Every playback handle dropped");
                None
            }
        };
        let Some(event) = event else {
            break;
        };

        let keep_running = match event {
            ControllerEvent::Command(command) => dispatch(&mut controller, &opener, command),
            ControllerEvent::Sink { attempt, signal } => {
                controller.handle_signal(attempt, signal);
                true
            }
            ControllerEvent::TimerFired { id, kind } => {
                controller.handle_timer(id, kind);
                true
            }
        };

        let next = controller.snapshot();
        snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        if !keep_running {
            break;
        }
    }

    controller.stop();
    snapshots.send_replace(controller.snapshot());
    info!("Playback service stopped");
}

/// Returns false when the service should exit
fn dispatch<S, O>(
    controller: &mut ConnectionController<S, TokioScheduler>,
    opener: &O,
    command: ControllerCommand,
) -> bool
where
    S: PlaybackSink,
    O: ExternalOpener,
{
    // a dropped reply receiver just means the caller stopped waiting
    match command {
        ControllerCommand::Play { address, kind, reply } => {
            let _ = reply.send(controller.play(&address, kind));
        }
        ControllerCommand::Stop { reply } => {
            controller.stop();
            let _ = reply.send(());
        }
        ControllerCommand::ForceRetry { reply } => {
            let _ = reply.send(controller.force_retry());
        }
        ControllerCommand::SetMuted { muted, reply } => {
            controller.set_muted(muted);
            let _ = reply.send(());
        }
        ControllerCommand::SeekTo { position, reply } => {
            let _ = reply.send(controller.seek_to(position));
        }
        ControllerCommand::AdjustTime { delta_seconds, reply } => {
            let _ = reply.send(controller.adjust_time(delta_seconds));
        }
        ControllerCommand::OpenExternally { reply } => {
            let outcome = match controller.address() {
                Some(address) => opener.open(address),
                None => Err(ControllerError::NoActiveSession),
            };
            let _ = reply.send(outcome);
        }
        ControllerCommand::Shutdown { reply } => {
            debug!("Shutdown requested");
            let _ = reply.send(());
            return false;
        }
    }
    true
}

/// Cloneable caller-side handle to a running `PlaybackService`.
///
/// The service stops its session and exits on `shutdown`, or once every
/// handle and every receiver from `subscribe` has been dropped.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    events: mpsc::UnboundedSender<ControllerEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl PlaybackHandle {
    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> ControllerCommand,
    ) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(ControllerEvent::Command(command(reply)))
            .map_err(|_| ControllerError::ServiceStopped)?;
        response.await.map_err(|_| ControllerError::ServiceStopped)
    }

    pub async fn play(&self, address: impl Into<String>, kind: ContentKind) -> Result<Uuid> {
        let address = address.into();
        self.request(|reply| ControllerCommand::Play { address, kind, reply })
            .await?
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::Stop { reply }).await
    }

    pub async fn force_retry(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::ForceRetry { reply })
            .await?
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| ControllerCommand::SetMuted { muted, reply })
            .await
    }

    pub async fn seek_to(&self, position: f64) -> Result<f64> {
        self.request(|reply| ControllerCommand::SeekTo { position, reply })
            .await?
    }

    pub async fn adjust_time(&self, delta_seconds: f64) -> Result<f64> {
        self.request(|reply| ControllerCommand::AdjustTime { delta_seconds, reply })
            .await?
    }

    /// Hand the session's address to the OS player association
    pub async fn open_externally(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::OpenExternally { reply })
            .await?
    }

    /// Stop the session and end the service task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| ControllerCommand::Shutdown { reply }).await
    }

    /// Snapshot stream, updated after every processed event that changed it
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }
}
