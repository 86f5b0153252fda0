//! Simulated vehicle and camera handles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::SimWorld;
use crate::collaborators::{Camera, DroneControl, Frame, MoveStatus};
use crate::error::{GarudaError, Result};
use crate::geometry::{Position, ScanPoint, bearing_of, normalize_bearing};

// Clearance is sampled along each segment at this spacing (meters)
const CLEARANCE_SAMPLE: f32 = 0.05;

/// Kinematic drone: moves in straight lines, no dynamics.
pub struct SimDrone {
    world: SimWorld,
}

impl SimDrone {
    pub(super) fn new(world: SimWorld) -> Self {
        Self { world }
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }
}

impl DroneControl for SimDrone {
    fn move_to(&mut self, target: Position, speed: f32) -> Result<MoveStatus> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(GarudaError::Drone(format!("invalid speed {}", speed)));
        }
        let params = Arc::clone(&self.world.params);

        let (travelled, status) = {
            let mut state = self.world.state.lock();
            let from = state.position;
            let distance = from.distance(&target);

            let (to, status) = if distance > params.max_move_distance {
                let t = params.max_move_distance / distance;
                let partial = Position::new(
                    from.north + (target.north - from.north) * t,
                    from.east + (target.east - from.east) * t,
                    from.down + (target.down - from.down) * t,
                );
                (partial, MoveStatus::TimedOut)
            } else {
                (target, MoveStatus::Arrived)
            };

            let samples = (from.planar_distance(&to) / CLEARANCE_SAMPLE).ceil().max(1.0) as usize;
            for k in 1..=samples {
                let t = k as f32 / samples as f32;
                let p = Position::new(
                    from.north + (to.north - from.north) * t,
                    from.east + (to.east - from.east) * t,
                    to.down,
                );
                state.min_clearance = state.min_clearance.min(self.world.clearance_at(&p));
            }

            let (d_north, d_east) = (to.north - from.north, to.east - from.east);
            if d_north.hypot(d_east) > 1e-4 {
                state.heading = bearing_of(d_north, d_east);
            }
            let travelled = from.distance(&to);
            state.position = to;
            state.distance_travelled += travelled;
            state.moves += 1;
            trace!(
                "Sim move to ({:.2}, {:.2}, {:.2}): {:?}",
                to.north, to.east, to.down, status
            );
            (travelled, status)
        };

        if params.time_scale > 0.0 {
            std::thread::sleep(Duration::from_secs_f32(
                travelled / speed * params.time_scale,
            ));
        }
        Ok(status)
    }

    fn hover(&mut self) -> Result<()> {
        Ok(())
    }

    fn turn_to(&mut self, heading: f32) -> Result<()> {
        self.world.state.lock().heading = normalize_bearing(heading);
        Ok(())
    }

    fn current_position(&self) -> Result<Position> {
        Ok(self.world.position())
    }

    fn current_heading(&self) -> Result<f32> {
        Ok(self.world.heading())
    }

    fn capture_frame(&mut self) -> Result<Frame> {
        Ok(capture(&self.world))
    }

    fn range_scan(&mut self) -> Result<Vec<ScanPoint>> {
        let position = self.world.position();
        Ok(self.world.scan_from(&position))
    }
}

/// Camera handle for the producer thread.
pub struct SimCamera {
    world: SimWorld,
}

impl SimCamera {
    pub(super) fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl Camera for SimCamera {
    fn capture_frame(&mut self) -> Result<Frame> {
        Ok(capture(&self.world))
    }
}

fn capture(world: &SimWorld) -> Frame {
    let camera = world.params.camera;
    let mut state = world.state.lock();
    let id = state.next_frame_id;
    state.next_frame_id += 1;

    Frame {
        id,
        width: camera.width,
        height: camera.height,
        pixels: Arc::from(Vec::new()),
        position: state.position,
        heading: state.heading,
        captured_at: Instant::now(),
    }
}
