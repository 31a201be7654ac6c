use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What the caller asked to play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Live,
    Movie,
    Series,
}

impl ContentKind {
    /// Movies and series episodes have a finite duration and can be seeked
    pub fn is_on_demand(&self) -> bool {
        !matches!(self, ContentKind::Live)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Live => write!(f, "live"),
            ContentKind::Movie => write!(f, "movie"),
            ContentKind::Series => write!(f, "series"),
        }
    }
}

/// How the sink should decode a resolved address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Manifest-driven segment delivery
    Adaptive,
    /// Hand the address straight to a non-adaptive playback path
    Direct,
}

/// Coarse category a sink attaches to every error it reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkErrorCategory {
    Network,
    Media,
    Other,
}

impl fmt::Display for SinkErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkErrorCategory::Network => write!(f, "network"),
            SinkErrorCategory::Media => write!(f, "media"),
            SinkErrorCategory::Other => write!(f, "other"),
        }
    }
}

/// An error reported by the playback sink.
///
/// Only the category and the fatal flag drive decisions; `detail` is carried
/// through to the session's last error message for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkError {
    pub category: SinkErrorCategory,
    pub fatal: bool,
    pub detail: String,
}

impl SinkError {
    pub fn fatal(category: SinkErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            fatal: true,
            detail: detail.into(),
        }
    }

    pub fn non_fatal(category: SinkErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            fatal: false,
            detail: detail.into(),
        }
    }

    /// Connection attempt exceeded its time budget; always a fatal network error
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::fatal(SinkErrorCategory::Network, detail)
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.fatal { "fatal" } else { "non-fatal" };
        write!(f, "{} {} error: {}", severity, self.category, self.detail)
    }
}

/// Identity of one sink attachment. Every `attach` gets a fresh id and every
/// signal the sink emits is tagged with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt#{}", self.0)
    }
}

/// Lifecycle and error signals emitted by a playback sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SinkSignal {
    /// Ready / first frames decoded
    Started,
    Paused,
    Buffering,
    Resumed,
    DurationKnown(f64),
    TimeAdvanced(f64),
    Error(SinkError),
}

/// Media readiness as reported by the sink, ordered from least to most data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// Not enough data buffered to keep playing
    pub fn is_insufficient(&self) -> bool {
        *self < ReadyState::HaveFutureData
    }
}

/// Point-in-time view of the sink used by the stall watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkHealth {
    /// Paused by the caller, not by starvation
    pub paused: bool,
    pub ready_state: ReadyState,
}

impl Default for SinkHealth {
    fn default() -> Self {
        Self {
            paused: false,
            ready_state: ReadyState::HaveNothing,
        }
    }
}

/// Connection controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session
    Idle,
    Connecting(usize),
    Playing,
    Buffering,
    Stalled,
    Escalating,
    Cooldown,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "IDLE"),
            ConnectionState::Connecting(index) => write!(f, "CONNECTING({})", index),
            ConnectionState::Playing => write!(f, "PLAYING"),
            ConnectionState::Buffering => write!(f, "BUFFERING"),
            ConnectionState::Stalled => write!(f, "STALLED"),
            ConnectionState::Escalating => write!(f, "ESCALATING"),
            ConnectionState::Cooldown => write!(f, "COOLDOWN"),
            ConnectionState::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}

/// Failure taxonomy used in classifier verdicts and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    NetworkFailure,
    MediaDecodeFailure,
    UnrecoverableFailure,
    /// Watchdog-originated; always handled locally
    StallDetected,
}

impl From<SinkErrorCategory> for FailureKind {
    fn from(category: SinkErrorCategory) -> Self {
        match category {
            SinkErrorCategory::Network => FailureKind::NetworkFailure,
            SinkErrorCategory::Media => FailureKind::MediaDecodeFailure,
            SinkErrorCategory::Other => FailureKind::UnrecoverableFailure,
        }
    }
}

/// Read-only observables published after every processed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub content_kind: Option<ContentKind>,
    pub state: ConnectionState,
    pub loading: bool,
    pub playing: bool,
    pub reconnecting: bool,
    pub retry_cycle_count: u32,
    pub current_strategy_index: Option<usize>,
    pub current_strategy_name: Option<String>,
    pub last_error_message: Option<String>,
    pub current_time: f64,
    pub duration: Option<f64>,
    pub muted: bool,
}

impl SessionSnapshot {
    /// Snapshot of a controller with no active session
    pub fn idle(muted: bool) -> Self {
        Self {
            session_id: None,
            started_at: None,
            address: None,
            content_kind: None,
            state: ConnectionState::Idle,
            loading: false,
            playing: false,
            reconnecting: false,
            retry_cycle_count: 0,
            current_strategy_index: None,
            current_strategy_name: None,
            last_error_message: None,
            current_time: 0.0,
            duration: None,
            muted,
        }
    }

    /// One-line human readable status
    pub fn status_line(&self) -> String {
        let strategy = self.current_strategy_name.as_deref().unwrap_or("-");
        let mut line = format!(
            "{} via {} (cycle {}, t={:.1}s)",
            self.state, strategy, self.retry_cycle_count, self.current_time
        );
        if self.reconnecting {
            line.push_str(" reconnecting");
        }
        if let Some(error) = &self.last_error_message {
            line.push_str(&format!(" last error: {}", error));
        }
        line
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::idle(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_ordering() {
        assert!(ReadyState::HaveNothing.is_insufficient());
        assert!(ReadyState::HaveCurrentData.is_insufficient());
        assert!(!ReadyState::HaveFutureData.is_insufficient());
        assert!(!ReadyState::HaveEnoughData.is_insufficient());
    }

    #[test]
    fn test_failure_kind_from_category() {
        assert_eq!(FailureKind::from(SinkErrorCategory::Network), FailureKind::NetworkFailure);
        assert_eq!(FailureKind::from(SinkErrorCategory::Media), FailureKind::MediaDecodeFailure);
        assert_eq!(FailureKind::from(SinkErrorCategory::Other), FailureKind::UnrecoverableFailure);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connecting(2).to_string(), "CONNECTING(2)");
        assert_eq!(ConnectionState::Cooldown.to_string(), "COOLDOWN");
    }

    #[test]
    fn test_snapshot_serializes_state_with_index() {
        let mut snapshot = SessionSnapshot::idle(true);
        snapshot.state = ConnectionState::Connecting(1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"]["state"], "connecting");
        assert_eq!(json["state"]["index"], 1);
        assert_eq!(json["muted"], true);
    }

    #[test]
    fn test_status_line_mentions_error() {
        let mut snapshot = SessionSnapshot::idle(false);
        snapshot.state = ConnectionState::Cooldown;
        snapshot.reconnecting = true;
        snapshot.last_error_message = Some("network down".to_string());

        let line = snapshot.status_line();
        assert!(line.starts_with("COOLDOWN"));
        assert!(line.contains("reconnecting"));
        assert!(line.contains("network down"));
    }
}
