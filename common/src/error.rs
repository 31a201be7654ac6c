use thiserror::Error;

/// Failure of an in-place sink recovery primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("No attachment to recover")]
    NotAttached,

    #[error("Recovery failed: {0}")]
    Failed(String),
}

pub type RecoveryResult = std::result::Result<(), RecoveryError>;
