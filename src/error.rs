//! Error types for GarudaNav

use std::time::Duration;

use thiserror::Error;

/// GarudaNav error type
#[derive(Error, Debug)]
pub enum GarudaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Drone Control collaborator failed (lost link, rejected command).
    #[error("Drone control error: {0}")]
    Drone(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Decision error: {0}")]
    Decision(String),

    #[error("Unrecognized action: {0:?}")]
    UnrecognizedAction(String),

    /// Every occupancy sector stayed obstructed for the whole hold/retry budget.
    #[error("No feasible heading after {attempts} attempts")]
    NoFeasibleHeading { attempts: u32 },

    #[error("No feedback for action '{action}' within {waited:?}")]
    FeedbackTimeout { action: String, waited: Duration },

    #[error("Decision reply still invalid after {attempts} attempts")]
    DecisionRetriesExhausted { attempts: u32 },

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// Shutdown was signalled while waiting on another thread.
    #[error("Shutdown requested")]
    ShuttingDown,
}

impl GarudaError {
    /// Faults that end the mission rather than being recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GarudaError::Io(_) | GarudaError::Config(_) | GarudaError::Drone(_)
        )
    }
}

impl From<toml::de::Error> for GarudaError {
    fn from(e: toml::de::Error) -> Self {
        GarudaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GarudaError>;
