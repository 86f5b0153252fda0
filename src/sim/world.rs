//! Shared simulated world: vehicle pose, obstacles and people.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::GarudaConfig;
use crate::geometry::{Position, ScanPoint, bearing_of};
use crate::perception::CameraModel;

use super::{SimCamera, SimDrone};

/// Vertical cylinder obstacle of unbounded height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cylinder {
    pub north: f32,
    pub east: f32,
    pub radius: f32,
}

impl Cylinder {
    /// Planar distance from `p` to the cylinder surface (negative inside).
    pub fn clearance(&self, p: &Position) -> f32 {
        (p.north - self.north).hypot(p.east - self.east) - self.radius
    }

    /// Distance along a unit ray from (north, east) to the first hit, if any.
    fn ray_hit(&self, north: f32, east: f32, dir_n: f32, dir_e: f32) -> Option<f32> {
        let (on, oe) = (north - self.north, east - self.east);
        let b = on * dir_n + oe * dir_e;
        let c = on * on + oe * oe - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let near = -b - root;
        let far = -b + root;
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            // Origin inside the cylinder
            Some(0.0)
        } else {
            None
        }
    }
}

pub(super) struct WorldState {
    pub position: Position,
    pub heading: f32,
    pub next_frame_id: u64,
    pub min_clearance: f32,
    pub distance_travelled: f32,
    pub moves: u64,
}

pub(super) struct WorldParams {
    pub time_scale: f32,
    pub max_move_distance: f32,
    pub lidar_rays: usize,
    pub lidar_range: f32,
    pub lidar_return_down: f32,
    pub detection_confidence: f32,
    pub target_label: String,
    pub target_height: f32,
    pub camera: CameraModel,
    pub obstacles: Vec<Cylinder>,
    pub people: Vec<Position>,
}

/// Handle to the simulated world. Clones share the same state.
#[derive(Clone)]
pub struct SimWorld {
    pub(super) state: Arc<Mutex<WorldState>>,
    pub(super) params: Arc<WorldParams>,
}

impl SimWorld {
    pub fn new(config: &GarudaConfig) -> Self {
        let sim = &config.simulation;
        let start = Position::from(sim.start);
        let obstacles: Vec<Cylinder> = sim
            .obstacles
            .iter()
            .map(|o| Cylinder {
                north: o.north,
                east: o.east,
                radius: o.radius,
            })
            .collect();
        let min_clearance = obstacles
            .iter()
            .map(|c| c.clearance(&start))
            .fold(f32::INFINITY, f32::min);

        Self {
            state: Arc::new(Mutex::new(WorldState {
                position: start,
                heading: 0.0,
                next_frame_id: 0,
                min_clearance,
                distance_travelled: 0.0,
                moves: 0,
            })),
            params: Arc::new(WorldParams {
                time_scale: sim.time_scale.max(0.0),
                max_move_distance: sim.max_move_distance,
                lidar_rays: sim.lidar_rays.max(1),
                lidar_range: sim.lidar_range,
                lidar_return_down: sim.lidar_return_down,
                detection_confidence: sim.detection_confidence,
                target_label: config.actions.target_label.clone(),
                target_height: config.actions.target_height,
                camera: config.camera_model(),
                obstacles,
                people: sim
                    .people
                    .iter()
                    .map(|p| Position::new(p.north, p.east, 0.0))
                    .collect(),
            }),
        }
    }

    /// Vehicle control handle.
    pub fn drone(&self) -> SimDrone {
        SimDrone::new(self.clone())
    }

    /// Frame source sharing the vehicle's pose.
    pub fn camera(&self) -> SimCamera {
        SimCamera::new(self.clone())
    }

    pub fn position(&self) -> Position {
        self.state.lock().position
    }

    pub fn heading(&self) -> f32 {
        self.state.lock().heading
    }

    /// Smallest planar distance to any obstacle surface seen so far.
    pub fn min_clearance(&self) -> f32 {
        self.state.lock().min_clearance
    }

    pub fn distance_travelled(&self) -> f32 {
        self.state.lock().distance_travelled
    }

    pub fn moves(&self) -> u64 {
        self.state.lock().moves
    }

    pub fn obstacles(&self) -> &[Cylinder] {
        &self.params.obstacles
    }

    /// Clearance from `p` to the nearest obstacle surface.
    pub fn clearance_at(&self, p: &Position) -> f32 {
        self.params
            .obstacles
            .iter()
            .map(|c| c.clearance(p))
            .fold(f32::INFINITY, f32::min)
    }

    /// Ray-cast a full revolution from `origin`.
    pub(super) fn scan_from(&self, origin: &Position) -> Vec<ScanPoint> {
        let params = &self.params;
        let step = 360.0 / params.lidar_rays as f32;
        let mut points = Vec::with_capacity(params.lidar_rays);

        for i in 0..params.lidar_rays {
            let rad = (i as f32 * step).to_radians();
            let (dir_n, dir_e) = (rad.cos(), rad.sin());
            let hit = params
                .obstacles
                .iter()
                .filter_map(|c| c.ray_hit(origin.north, origin.east, dir_n, dir_e))
                .fold(f32::INFINITY, f32::min);

            if hit < params.lidar_range {
                points.push(ScanPoint::new(
                    hit * dir_n,
                    hit * dir_e,
                    params.lidar_return_down,
                ));
            }
        }
        points
    }

    /// People as (bearing, planar distance) from `origin`.
    pub(super) fn people_from(&self, origin: &Position) -> Vec<(f32, f32)> {
        self.params
            .people
            .iter()
            .map(|p| {
                let bearing = bearing_of(p.north - origin.north, p.east - origin.east);
                (bearing, origin.planar_distance(p))
            })
            .collect()
    }
}
