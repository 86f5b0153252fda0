//! Runs interrupting actions to completion and reports their feedback.
//!
//! The coordinator is called from the navigation loop and blocks it for the
//! whole burst of queued actions, so exactly one of {loop, handler} commands
//! the vehicle at any time.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use super::handlers::{ActionContext, ActionHandler, default_handlers};
use super::{Action, ActionRequest, Feedback, FeedbackStatus};
use crate::collaborators::{Detector, DroneControl};
use crate::config::{ActionsConfig, GarudaConfig};
use crate::error::Result;
use crate::perception::CameraModel;
use crate::planning::Planner;

/// Result of handling one interrupt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Requests processed, including rejected ones
    pub executed: usize,
    /// Any handler asked to abandon the current waypoint
    pub skip_waypoint: bool,
}

/// Action lookup, execution and feedback.
pub struct ActionCoordinator {
    handlers: HashMap<Action, Box<dyn ActionHandler>>,
    feedback: Sender<Feedback>,
    detector: Arc<dyn Detector>,
    planner: Planner,
    camera: CameraModel,
    config: ActionsConfig,
    move_speed: f32,
    arrival_tolerance: f32,
}

impl ActionCoordinator {
    /// Create a coordinator with the full default action set.
    pub fn new(config: &GarudaConfig, detector: Arc<dyn Detector>, feedback: Sender<Feedback>) -> Self {
        let mut coordinator = Self::without_handlers(config, detector, feedback);
        for handler in default_handlers() {
            coordinator.register(handler);
        }
        coordinator
    }

    /// Create a coordinator with no handlers registered.
    pub fn without_handlers(
        config: &GarudaConfig,
        detector: Arc<dyn Detector>,
        feedback: Sender<Feedback>,
    ) -> Self {
        Self {
            handlers: HashMap::new(),
            feedback,
            detector,
            planner: config.planner(),
            camera: config.camera_model(),
            config: config.actions.clone(),
            move_speed: config.navigation.move_speed,
            arrival_tolerance: config.navigation.waypoint_tolerance,
        }
    }

    /// Register (or replace) the handler for its action.
    pub fn register(&mut self, handler: Box<dyn ActionHandler>) {
        self.handlers.insert(handler.action(), handler);
    }

    pub fn supports(&self, action: Action) -> bool {
        self.handlers.contains_key(&action)
    }

    /// Run `first`, then every request already queued behind it.
    ///
    /// Skip signals from a burst are OR-ed. Only fatal collaborator errors
    /// are returned; everything else becomes feedback.
    pub fn handle(
        &mut self,
        first: ActionRequest,
        drone: &mut dyn DroneControl,
        queue: &Receiver<ActionRequest>,
    ) -> Result<DrainSummary> {
        let mut summary = DrainSummary::default();
        let mut next = Some(first);

        while let Some(request) = next {
            let skip = self.execute(request, drone)?;
            summary.executed += 1;
            summary.skip_waypoint |= skip;
            next = queue.try_recv().ok();
        }

        if summary.executed > 1 {
            info!("Drained {} queued actions", summary.executed);
        }
        Ok(summary)
    }

    /// Run one request and deposit its feedback. Returns the skip signal.
    fn execute(&mut self, request: ActionRequest, drone: &mut dyn DroneControl) -> Result<bool> {
        let Some(handler) = self.handlers.get_mut(&request.action) else {
            warn!("No handler for action '{}' (seq {})", request.action, request.seq);
            self.report(
                request,
                FeedbackStatus::Rejected,
                format!(
                    "Action '{}' is not available; choose one of: {}",
                    request.action,
                    self.available()
                ),
            );
            return Ok(false);
        };

        info!("Running action '{}' (seq {})", request.action, request.seq);
        let mut ctx = ActionContext {
            drone,
            detector: self.detector.as_ref(),
            planner: &self.planner,
            camera: &self.camera,
            config: &self.config,
            move_speed: self.move_speed,
            arrival_tolerance: self.arrival_tolerance,
        };

        match handler.run(&mut ctx) {
            Ok(outcome) => {
                info!(
                    "Action '{}' finished: {} (skip waypoint: {})",
                    request.action, outcome.message, outcome.skip_waypoint
                );
                self.report(request, FeedbackStatus::Completed, outcome.message);
                Ok(outcome.skip_waypoint)
            }
            Err(e) if e.is_fatal() => {
                error!("Action '{}' hit a fatal error: {}", request.action, e);
                self.report(
                    request,
                    FeedbackStatus::Failed,
                    format!("Action '{}' aborted: {}", request.action, e),
                );
                Err(e)
            }
            Err(e) => {
                warn!("Action '{}' failed: {}", request.action, e);
                self.report(
                    request,
                    FeedbackStatus::Failed,
                    format!("Action '{}' failed: {}; choose the next action", request.action, e),
                );
                Ok(false)
            }
        }
    }

    fn available(&self) -> String {
        Action::ALL
            .iter()
            .filter(|a| self.handlers.contains_key(a))
            .map(|a| a.identifier())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn report(&self, request: ActionRequest, status: FeedbackStatus, message: String) {
        let feedback = Feedback {
            seq: request.seq,
            action: request.action,
            status,
            message,
        };
        if self.feedback.send(feedback).is_err() {
            warn!(
                "Feedback for action '{}' dropped: decision side has gone away",
                request.action
            );
        }
    }
}
