//! Nearest-gap heading selection over the occupancy histogram.
//!
//! Not a path planner: it only steers around the obstacle arc in front of the
//! vehicle, at O(72) cost per control step.

use super::occupancy::OccupancyMap;
use crate::geometry::{Position, SECTOR_COUNT, sector_bearing, sector_index};

/// Clockwise scan limit (half the circle).
const CLOCKWISE_SCAN_LIMIT: usize = SECTOR_COUNT / 2;

/// Counter-clockwise scan limit (every other sector).
const COUNTER_CLOCKWISE_SCAN_LIMIT: usize = SECTOR_COUNT - 1;

/// How a heading was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Steering {
    /// Straight line to the target is clear
    Direct,
    /// Nearest clear sector found turning clockwise
    Clockwise { steps: usize },
    /// Nearest clear sector found turning counter-clockwise
    CounterClockwise { steps: usize },
}

/// Selected heading toward a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionChoice {
    /// Heading to fly (degrees, [0, 360))
    pub heading: f32,
    /// Sector the heading belongs to
    pub sector: usize,
    pub steering: Steering,
}

impl DirectionChoice {
    pub fn is_detour(&self) -> bool {
        self.steering != Steering::Direct
    }
}

/// Pick a safe heading from `current` toward `target`.
///
/// Returns `None` when every sector is obstructed.
pub fn select_direction(
    current: &Position,
    target: &Position,
    map: &OccupancyMap,
) -> Option<DirectionChoice> {
    select_from_bearing(current.bearing_to(target), map)
}

/// Pick a safe heading given the straight-line bearing to the target.
///
/// A clear direct sector returns the exact bearing. Otherwise the nearest
/// clear sector wins, ties going clockwise, and its nominal bearing is returned.
pub fn select_from_bearing(target_bearing: f32, map: &OccupancyMap) -> Option<DirectionChoice> {
    let idx = sector_index(target_bearing);

    if map.is_clear(idx) {
        return Some(DirectionChoice {
            heading: target_bearing,
            sector: idx,
            steering: Steering::Direct,
        });
    }

    let clockwise = (1..=CLOCKWISE_SCAN_LIMIT).find(|&k| map.is_clear((idx + k) % SECTOR_COUNT));
    let counter_clockwise = (1..=COUNTER_CLOCKWISE_SCAN_LIMIT)
        .find(|&k| map.is_clear((idx + SECTOR_COUNT - k) % SECTOR_COUNT));

    let (sector, steering) = match (clockwise, counter_clockwise) {
        (None, None) => return None,
        (Some(r), Some(l)) if r <= l => ((idx + r) % SECTOR_COUNT, Steering::Clockwise { steps: r }),
        (Some(r), None) => ((idx + r) % SECTOR_COUNT, Steering::Clockwise { steps: r }),
        (_, Some(l)) => (
            (idx + SECTOR_COUNT - l) % SECTOR_COUNT,
            Steering::CounterClockwise { steps: l },
        ),
    };

    Some(DirectionChoice {
        heading: sector_bearing(sector),
        sector,
        steering,
    })
}
