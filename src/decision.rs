//! Decision protocol: strict reply parsing and bounded re-prompting.
//!
//! The external decision process answers in free text. Each stage accepts a
//! closed set of replies; anything else is re-prompted with a correction
//! note until the retry budget runs out.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::actions::Action;
use crate::collaborators::{DecisionMaker, Frame};
use crate::error::{GarudaError, Result};

/// Which question is being asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionStage {
    /// Is a trapped person likely nearby? (`yes` / `no`)
    Assess,
    /// Which action next? (an action identifier or `none`)
    ChooseAction,
}

impl fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStage::Assess => write!(f, "assess"),
            DecisionStage::ChooseAction => write!(f, "choose-action"),
        }
    }
}

/// Everything the decision process sees besides the frame.
#[derive(Clone, Debug)]
pub struct DecisionContext {
    pub stage: DecisionStage,
    pub labels: BTreeSet<String>,
    /// Feedback from the previous action of this episode
    pub feedback: Option<String>,
    /// Set when the previous reply was rejected
    pub correction: Option<String>,
    /// Actions already taken this episode, oldest first
    pub history: Vec<Action>,
}

impl DecisionContext {
    /// Human-readable prompt for text-based decision makers.
    pub fn prompt(&self) -> String {
        let labels = self.labels.iter().cloned().collect::<Vec<_>>().join(", ");
        let mut prompt = match self.stage {
            DecisionStage::Assess => format!(
                "The drone camera sees: {}. Is a trapped person likely nearby? Answer yes or no.",
                labels
            ),
            DecisionStage::ChooseAction => {
                let options: String = Action::ALL
                    .iter()
                    .map(|a| format!("- {}: {}\n", a.identifier(), a.describe()))
                    .collect();
                format!(
                    "The drone camera sees: {}. Choose the next action:\n{}- none: nothing more to do\nAnswer with the action name only.",
                    labels, options
                )
            }
        };
        if !self.history.is_empty() {
            let taken = self
                .history
                .iter()
                .map(|a| a.identifier())
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!("\nActions taken so far: {}.", taken));
        }
        if let Some(feedback) = &self.feedback {
            prompt.push_str(&format!("\nFeedback: {}", feedback));
        }
        if let Some(correction) = &self.correction {
            prompt.push_str(&format!("\nNote: {}", correction));
        }
        prompt
    }
}

/// Reply to the assess stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Assessment {
    Likely,
    Unlikely,
}

impl FromStr for Assessment {
    type Err = GarudaError;

    fn from_str(s: &str) -> Result<Self> {
        match normalize_reply(s).as_str() {
            "yes" => Ok(Assessment::Likely),
            "no" => Ok(Assessment::Unlikely),
            _ => Err(GarudaError::Decision(format!(
                "expected yes or no, got '{}'",
                s.trim()
            ))),
        }
    }
}

/// Reply to the choose-action stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    Act(Action),
    Done,
}

impl FromStr for Choice {
    type Err = GarudaError;

    fn from_str(s: &str) -> Result<Self> {
        if normalize_reply(s) == "none" {
            return Ok(Choice::Done);
        }
        s.parse::<Action>().map(Choice::Act)
    }
}

fn normalize_reply(s: &str) -> String {
    s.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// One conversation with the decision process, spanning an episode.
pub struct DecisionSession {
    maker: Box<dyn DecisionMaker>,
    max_attempts: u32,
    history: Vec<Action>,
    feedback: Option<String>,
    correction: Option<String>,
}

impl DecisionSession {
    pub fn new(maker: Box<dyn DecisionMaker>, max_attempts: u32) -> Self {
        Self {
            maker,
            max_attempts: max_attempts.max(1),
            history: Vec::new(),
            feedback: None,
            correction: None,
        }
    }

    /// Ask whether the scene warrants a rescue episode.
    pub fn assess(&mut self, labels: &BTreeSet<String>, frame: &Frame) -> Result<bool> {
        let reply: Assessment = self.ask(DecisionStage::Assess, labels, frame)?;
        Ok(reply == Assessment::Likely)
    }

    /// Ask for the next action.
    pub fn choose(&mut self, labels: &BTreeSet<String>, frame: &Frame) -> Result<Choice> {
        self.ask(DecisionStage::ChooseAction, labels, frame)
    }

    /// Record an action as taken, with the feedback it produced.
    pub fn record(&mut self, action: Action, feedback: impl Into<String>) {
        self.history.push(action);
        self.feedback = Some(feedback.into());
    }

    /// Carry a correction into the next prompt.
    pub fn correct(&mut self, note: impl Into<String>) {
        self.correction = Some(note.into());
    }

    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// Forget the episode.
    pub fn reset(&mut self) {
        self.history.clear();
        self.feedback = None;
        self.correction = None;
    }

    fn ask<T>(&mut self, stage: DecisionStage, labels: &BTreeSet<String>, frame: &Frame) -> Result<T>
    where
        T: FromStr<Err = GarudaError>,
    {
        for attempt in 1..=self.max_attempts {
            let context = DecisionContext {
                stage,
                labels: labels.clone(),
                feedback: self.feedback.clone(),
                correction: self.correction.take(),
                history: self.history.clone(),
            };
            let reply = self.maker.decide(&context, frame)?;
            debug!("Decision ({}) attempt {}: {:?}", stage, attempt, reply);

            match reply.parse::<T>() {
                Ok(parsed) => return Ok(parsed),
                Err(e) => {
                    warn!("Invalid {} reply on attempt {}: {}", stage, attempt, e);
                    self.correction = Some(format!(
                        "Your last reply '{}' was not understood ({}). Reply with exactly one of the listed options.",
                        reply.trim(),
                        e
                    ));
                }
            }
        }

        self.correction = None;
        Err(GarudaError::DecisionRetriesExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Built-in decision maker following a fixed rescue script.
pub struct ScriptedRescue {
    target_label: String,
    script: Vec<Action>,
}

impl ScriptedRescue {
    pub fn new(target_label: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
            script: vec![
                Action::MoveTo,
                Action::Broadcast,
                Action::Drop,
                Action::Console,
                Action::SeekNext,
            ],
        }
    }
}

impl DecisionMaker for ScriptedRescue {
    fn decide(&mut self, context: &DecisionContext, _frame: &Frame) -> Result<String> {
        let reply = match context.stage {
            DecisionStage::Assess => {
                if context.labels.contains(&self.target_label) {
                    "yes"
                } else {
                    "no"
                }
            }
            DecisionStage::ChooseAction => self
                .script
                .get(context.history.len())
                .map(|a| a.identifier())
                .unwrap_or("none"),
        };
        Ok(reply.to_string())
    }
}
