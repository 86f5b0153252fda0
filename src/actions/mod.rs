//! Named actions that interrupt the patrol.
//!
//! The action set is closed. Identifiers coming from the decision process are
//! parsed strictly; anything unknown is an [`GarudaError::UnrecognizedAction`].

mod coordinator;
mod handlers;

pub use coordinator::{ActionCoordinator, DrainSummary};
pub use handlers::{ActionContext, ActionHandler, default_handlers};

use std::fmt;
use std::str::FromStr;

use crate::error::GarudaError;

/// Every behaviour the decision process may request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Search the surroundings for the target
    Seek,
    /// Approach the detected person
    MoveTo,
    /// Notify headquarters of the find
    Broadcast,
    /// Release emergency supplies
    Drop,
    /// Reassure the trapped person
    Console,
    /// Person handled, continue to the next waypoint
    SeekNext,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Seek,
        Action::MoveTo,
        Action::Broadcast,
        Action::Drop,
        Action::Console,
        Action::SeekNext,
    ];

    /// Canonical wire identifier.
    pub fn identifier(&self) -> &'static str {
        match self {
            Action::Seek => "seek",
            Action::MoveTo => "moveto",
            Action::Broadcast => "broadcast",
            Action::Drop => "drop",
            Action::Console => "console",
            Action::SeekNext => "seek-next",
        }
    }

    /// Short description offered to the decision process.
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Seek => "search nearby for trapped people",
            Action::MoveTo => "move to the trapped person",
            Action::Broadcast => "notify headquarters that a person was found",
            Action::Drop => "drop emergency supplies to the person",
            Action::Console => "reassure the trapped person",
            Action::SeekNext => "person rescued, continue searching for others",
        }
    }

    /// Comma-separated list of identifiers, for prompts and error messages.
    pub fn catalogue() -> String {
        Action::ALL
            .iter()
            .map(|a| a.identifier())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Action {
    type Err = GarudaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim()
            .to_ascii_lowercase();

        match token.as_str() {
            "seek" => Ok(Action::Seek),
            "moveto" => Ok(Action::MoveTo),
            "broadcast" => Ok(Action::Broadcast),
            "drop" => Ok(Action::Drop),
            "console" => Ok(Action::Console),
            "seek-next" | "seek_next" => Ok(Action::SeekNext),
            _ => Err(GarudaError::UnrecognizedAction(s.to_string())),
        }
    }
}

/// An action queued on the action channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionRequest {
    /// Correlates the request with its feedback
    pub seq: u64,
    pub action: Action,
}

/// How an action ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackStatus {
    Completed,
    /// Handler hit a recoverable fault
    Failed,
    /// No handler for the requested action
    Rejected,
}

/// Completion report deposited on the feedback channel, one per request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub seq: u64,
    pub action: Action,
    pub status: FeedbackStatus,
    pub message: String,
}

/// What a handler returns when it runs to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Human/agent-readable report
    pub message: String,
    /// Abandon the current waypoint instead of resuming it
    pub skip_waypoint: bool,
}

impl ActionOutcome {
    pub fn resume(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            skip_waypoint: false,
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            skip_waypoint: true,
        }
    }
}
