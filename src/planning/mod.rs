//! Obstacle-aware local planning.
//!
//! This module provides:
//! - Occupancy histogram from a range scan
//! - Nearest-gap direction selection
//! - Step generation toward the chosen heading

mod direction;
mod occupancy;
mod step;

pub use direction::{DirectionChoice, Steering, select_direction, select_from_bearing};
pub use occupancy::{INFLATION_SECTORS, ObstacleFilter, OccupancyMap};
pub use step::next_step;

use crate::geometry::{Position, ScanPoint};

/// One planned control step.
#[derive(Clone, Debug)]
pub struct PlannedStep {
    pub choice: DirectionChoice,
    /// Position to command next
    pub next: Position,
    pub map: OccupancyMap,
}

/// Composes map building, direction selection and step generation.
#[derive(Clone, Debug)]
pub struct Planner {
    filter: ObstacleFilter,
    step_length: f32,
}

impl Planner {
    pub fn new(filter: ObstacleFilter, step_length: f32) -> Self {
        Self {
            filter,
            step_length,
        }
    }

    pub fn step_length(&self) -> f32 {
        self.step_length
    }

    pub fn filter(&self) -> &ObstacleFilter {
        &self.filter
    }

    /// Plan the next step from `current` toward `target` given a fresh scan.
    ///
    /// The step is clipped to the remaining planar distance so the vehicle
    /// does not overshoot. Returns `None` when no heading is feasible.
    pub fn plan(
        &self,
        current: &Position,
        target: &Position,
        scan: &[ScanPoint],
    ) -> Option<PlannedStep> {
        let map = OccupancyMap::from_scan(scan, &self.filter);
        let choice = select_direction(current, target, &map)?;
        let length = self.step_length.min(current.planar_distance(target));
        let next = next_step(current, choice.heading, length, target.down);

        Some(PlannedStep { choice, next, map })
    }
}
