//! Patrol loop with obstacle-aware stepping and action interrupts.
//!
//! Each iteration:
//! 1. Check arrival at the current waypoint
//! 2. Scan, plan one short step and command it (or hover when boxed in)
//! 3. Poll the action channel; an interrupt hands the vehicle to the
//!    coordinator until the queued burst is drained

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::actions::{ActionCoordinator, ActionRequest};
use crate::collaborators::{DroneControl, MoveStatus};
use crate::config::GarudaConfig;
use crate::error::{GarudaError, Result};
use crate::geometry::Position;
use crate::planning::Planner;
use crate::shared::{MissionStats, SharedState};

/// Who currently commands the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavState {
    Patrolling,
    /// An action handler holds the vehicle
    Interrupted,
}

/// What one iteration did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepOutcome {
    /// Stepped toward the current waypoint
    Moved { heading: f32, detour: bool },
    /// No feasible heading; hovering before a rescan
    Held { attempt: u32 },
    /// Waypoint `index` reached, moving on
    WaypointReached { index: usize },
    /// Actions ran; `skipped` when the waypoint was abandoned
    Interrupted { executed: usize, skipped: bool },
    /// One-shot route finished
    RouteComplete,
}

/// Drives the vehicle along the route one planned step at a time.
pub struct NavigationLoop {
    drone: Box<dyn DroneControl>,
    planner: Planner,
    coordinator: ActionCoordinator,
    actions: Receiver<ActionRequest>,
    actions_open: bool,

    route: Vec<Position>,
    index: usize,
    complete: bool,
    state: NavState,
    blocked_attempts: u32,

    tolerance: f32,
    move_speed: f32,
    action_poll: Duration,
    hold_interval: Duration,
    max_blocked_retries: u32,
    repeat_route: bool,
}

impl NavigationLoop {
    pub fn new(
        config: &GarudaConfig,
        drone: Box<dyn DroneControl>,
        coordinator: ActionCoordinator,
        actions: Receiver<ActionRequest>,
    ) -> Result<Self> {
        let route = config.waypoints();
        if route.is_empty() {
            return Err(GarudaError::Config("route has no waypoints".into()));
        }

        let nav = &config.navigation;
        Ok(Self {
            drone,
            planner: config.planner(),
            coordinator,
            actions,
            actions_open: true,
            route,
            index: 0,
            complete: false,
            state: NavState::Patrolling,
            blocked_attempts: 0,
            tolerance: nav.waypoint_tolerance,
            move_speed: nav.move_speed,
            action_poll: Duration::from_millis(nav.action_poll_ms),
            hold_interval: Duration::from_millis(nav.hold_interval_ms),
            max_blocked_retries: nav.max_blocked_retries,
            repeat_route: nav.repeat_route,
        })
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Index of the waypoint currently being flown to.
    pub fn route_index(&self) -> usize {
        self.index
    }

    pub fn current_waypoint(&self) -> Option<Position> {
        if self.complete {
            None
        } else {
            self.route.get(self.index).copied()
        }
    }

    pub fn drone_mut(&mut self) -> &mut dyn DroneControl {
        self.drone.as_mut()
    }

    /// Run one iteration.
    ///
    /// Returns `NoFeasibleHeading` once the hold/rescan budget is spent;
    /// the counter resets so the caller may keep going.
    pub fn step(&mut self) -> Result<StepOutcome> {
        let Some(target) = self.current_waypoint() else {
            return Ok(StepOutcome::RouteComplete);
        };

        let current = self.drone.current_position()?;
        if current.planar_distance(&target) < self.tolerance {
            let index = self.index;
            info!(
                "Reached waypoint {} ({:.1}, {:.1}, {:.1})",
                index, target.north, target.east, target.down
            );
            self.advance();
            return Ok(StepOutcome::WaypointReached { index });
        }

        let scan = self.drone.range_scan()?;
        let outcome = match self.planner.plan(&current, &target, &scan) {
            Some(planned) => {
                self.blocked_attempts = 0;
                if planned.choice.is_detour() {
                    debug!(
                        "Detour: sector {} at {:.0}° ({:?})",
                        planned.choice.sector, planned.choice.heading, planned.choice.steering
                    );
                }
                if self.drone.move_to(planned.next, self.move_speed)? == MoveStatus::TimedOut {
                    warn!(
                        "Move to ({:.1}, {:.1}) timed out; continuing from current position",
                        planned.next.north, planned.next.east
                    );
                }
                StepOutcome::Moved {
                    heading: planned.choice.heading,
                    detour: planned.choice.is_detour(),
                }
            }
            None => {
                self.blocked_attempts += 1;
                self.drone.hover()?;
                if self.blocked_attempts > self.max_blocked_retries {
                    let attempts = self.blocked_attempts;
                    self.blocked_attempts = 0;
                    return Err(GarudaError::NoFeasibleHeading { attempts });
                }
                warn!(
                    "No feasible heading (attempt {}/{}), holding",
                    self.blocked_attempts,
                    self.max_blocked_retries + 1
                );
                std::thread::sleep(self.hold_interval);
                StepOutcome::Held {
                    attempt: self.blocked_attempts,
                }
            }
        };

        Ok(self.poll_interrupt()?.unwrap_or(outcome))
    }

    /// Run until shutdown, a fatal fault, or the end of a one-shot route.
    pub fn run(&mut self, shared: &SharedState) -> Result<()> {
        info!(
            "Navigation started: {} waypoints, {}",
            self.route.len(),
            if self.repeat_route { "continuous patrol" } else { "single pass" }
        );
        let stats = &shared.stats;

        let result = loop {
            if shared.should_shutdown() {
                info!("Navigation shutting down");
                break Ok(());
            }

            match self.step() {
                Ok(StepOutcome::Moved { detour, .. }) => {
                    MissionStats::bump(&stats.steps);
                    if detour {
                        MissionStats::bump(&stats.detour_steps);
                    }
                }
                Ok(StepOutcome::Held { .. }) => MissionStats::bump(&stats.blocked_holds),
                Ok(StepOutcome::WaypointReached { .. }) => {
                    MissionStats::bump(&stats.waypoints_reached)
                }
                Ok(StepOutcome::Interrupted { executed, skipped }) => {
                    MissionStats::add(&stats.actions_executed, executed as u64);
                    if skipped {
                        MissionStats::bump(&stats.waypoints_skipped);
                    }
                }
                Ok(StepOutcome::RouteComplete) => {
                    info!("Route complete");
                    shared.set_route_complete();
                    break Ok(());
                }
                Err(e) if e.is_fatal() => break Err(e),
                Err(e) => {
                    // Keep holding and rescanning
                    error!("Navigation fault: {}", e);
                    shared.report_navigation_fault(e.to_string());
                }
            }
        };

        if let Err(e) = self.drone.hover() {
            warn!("Failed to hover on exit: {}", e);
        }
        result
    }

    /// Wait briefly for an action and, if one arrives, hand over the vehicle.
    fn poll_interrupt(&mut self) -> Result<Option<StepOutcome>> {
        if !self.actions_open {
            return Ok(None);
        }

        let first = match self.actions.recv_timeout(self.action_poll) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Action channel closed; patrolling without interrupts");
                self.actions_open = false;
                return Ok(None);
            }
        };

        info!("Patrol interrupted by '{}' (seq {})", first.action, first.seq);
        self.state = NavState::Interrupted;
        let drained = self
            .coordinator
            .handle(first, self.drone.as_mut(), &self.actions);
        self.state = NavState::Patrolling;
        let summary = drained?;

        if summary.skip_waypoint {
            info!("Skipping waypoint {}", self.index);
            self.advance();
        } else {
            debug!("Resuming patrol toward waypoint {}", self.index);
        }

        Ok(Some(StepOutcome::Interrupted {
            executed: summary.executed,
            skipped: summary.skip_waypoint,
        }))
    }

    fn advance(&mut self) {
        self.index += 1;
        if self.index >= self.route.len() {
            if self.repeat_route {
                info!("Route finished, restarting patrol");
                self.index = 0;
            } else {
                self.complete = true;
            }
        }
    }
}
