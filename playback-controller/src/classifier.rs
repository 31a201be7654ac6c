use common::{DeliveryMode, FailureKind, SinkError, SinkErrorCategory};

/// What the controller should do about a sink error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Ask the sink to restart segment loading in place
    ResumeNetworkLoad,
    /// Ask the sink to reset its decoder in place
    RecoverMediaError,
    /// Detach and move to the next strategy now
    Escalate,
    /// Native path: escalate once the grace delay passes without playback
    EscalateAfterGrace,
    /// Non-fatal adaptive error the sink handles by itself
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub failure: FailureKind,
    pub action: RecoveryAction,
}

/// Categories that already used their in-place recovery since the attempt
/// last reached PLAYING
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryLedger {
    network: bool,
    media: bool,
}

impl RecoveryLedger {
    pub fn record(&mut self, category: SinkErrorCategory) {
        match category {
            SinkErrorCategory::Network => self.network = true,
            SinkErrorCategory::Media => self.media = true,
            SinkErrorCategory::Other => {}
        }
    }

    pub fn has_recovered(&self, category: SinkErrorCategory) -> bool {
        match category {
            SinkErrorCategory::Network => self.network,
            SinkErrorCategory::Media => self.media,
            SinkErrorCategory::Other => false,
        }
    }

    /// Playback succeeded; every category gets a fresh in-place attempt
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Map a sink error to a recovery action
pub fn classify(error: &SinkError, mode: DeliveryMode, ledger: &RecoveryLedger) -> Verdict {
    let failure = FailureKind::from(error.category);

    let action = match mode {
        DeliveryMode::Direct => RecoveryAction::EscalateAfterGrace,
        DeliveryMode::Adaptive if !error.fatal => RecoveryAction::Ignore,
        DeliveryMode::Adaptive => match error.category {
            category if ledger.has_recovered(category) => RecoveryAction::Escalate,
            SinkErrorCategory::Network => RecoveryAction::ResumeNetworkLoad,
            SinkErrorCategory::Media => RecoveryAction::RecoverMediaError,
            SinkErrorCategory::Other => RecoveryAction::Escalate,
        },
    };

    Verdict { failure, action }
}
