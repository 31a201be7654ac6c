use std::io;
use thiserror::Error;

/// Caller-facing errors of the playback controller
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Invalid source address: {0:?}")]
    InvalidAddress(String),

    #[error("No active playback session")]
    NoActiveSession,

    #[error("Invalid seek position: {0}")]
    InvalidSeekPosition(f64),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to open externally: {reason}")]
    ExternalOpen { reason: String },

    #[error("Playback service has stopped")]
    ServiceStopped,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ControllerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ControllerError::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
