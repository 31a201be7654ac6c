use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// How the simulated sink behaves for one attach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// First frames shortly after attach
    Play,
    /// Starts buffering and never gets enough data
    Stall,
    /// Buffers for a while, then resumes
    Buffer,
    /// Fatal network error that recurs after every resume
    FailNetwork,
    /// Fatal media error that recurs after every decoder reset
    FailMedia,
    /// Fatal error with no in-place recovery
    FailOther,
    /// Network error that clears after one resume
    RecoverNetwork,
    /// Never signals anything
    Silent,
}

impl Outcome {
    const ALL: [(&'static str, Outcome); 8] = [
        ("play", Outcome::Play),
        ("stall", Outcome::Stall),
        ("buffer", Outcome::Buffer),
        ("fail-network", Outcome::FailNetwork),
        ("fail-media", Outcome::FailMedia),
        ("fail-other", Outcome::FailOther),
        ("recover-network", Outcome::RecoverNetwork),
        ("silent", Outcome::Silent),
    ];

    fn name(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, outcome)| outcome == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown")
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Empty script")]
    Empty,

    #[error("Unknown outcome {0:?} (expected one of play, stall, buffer, fail-network, fail-media, fail-other, recover-network, silent)")]
    UnknownOutcome(String),
}

impl FromStr for Outcome {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, outcome)| *outcome)
            .ok_or_else(|| ScriptError::UnknownOutcome(s.trim().to_string()))
    }
}

/// Per-attach outcomes, consumed in attach order; the last one repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    outcomes: Vec<Outcome>,
}

impl Script {
    pub fn new(outcomes: Vec<Outcome>) -> Result<Self, ScriptError> {
        if outcomes.is_empty() {
            return Err(ScriptError::Empty);
        }
        Ok(Self { outcomes })
    }

    /// Outcome of the attach with zero-based ordinal `attach`
    pub fn outcome_for(&self, attach: usize) -> Outcome {
        let last = self.outcomes.len() - 1;
        self.outcomes[attach.min(last)]
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let outcomes = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Outcome::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(outcomes)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.outcomes.iter().map(Outcome::name).collect();
        f.write_str(&names.join(","))
    }
}
