//! Configuration loading for GarudaNav

use crate::error::{GarudaError, Result};
use crate::geometry::Position;
use crate::perception::CameraModel;
use crate::planning::{ObstacleFilter, Planner};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GarudaConfig {
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub route: RouteConfig,
    #[serde(default)]
    pub perception: PerceptionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Obstacle avoidance and patrol parameters
#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Planar range under which scan returns count as obstacles (meters)
    #[serde(default = "default_detection_radius")]
    pub detection_radius: f32,

    /// Reference height offset of the obstacle band (meters, down positive)
    #[serde(default = "default_band_center")]
    pub band_center: f32,

    /// Half-width of the obstacle band (meters)
    #[serde(default = "default_band_half_width")]
    pub band_half_width: f32,

    /// Distance flown per control step (meters)
    #[serde(default = "default_step_length")]
    pub step_length: f32,

    /// Distance at which a waypoint counts as reached (meters)
    #[serde(default = "default_waypoint_tolerance")]
    pub waypoint_tolerance: f32,

    /// Commanded speed for each step (m/s)
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,

    /// How long to wait for an action after each step (milliseconds)
    #[serde(default = "default_action_poll_ms")]
    pub action_poll_ms: u64,

    /// Hold-and-rescan attempts before a blocked heading becomes a fault
    #[serde(default = "default_max_blocked_retries")]
    pub max_blocked_retries: u32,

    /// Pause between hold-and-rescan attempts (milliseconds)
    #[serde(default = "default_hold_interval_ms")]
    pub hold_interval_ms: u64,

    /// Restart from the first waypoint when the route is exhausted
    #[serde(default = "default_repeat_route")]
    pub repeat_route: bool,
}

/// Patrol route
#[derive(Clone, Debug, Deserialize)]
pub struct RouteConfig {
    /// Waypoints as [north, east, down] in meters
    #[serde(default = "default_waypoints")]
    pub waypoints: Vec<[f32; 3]>,
}

/// Detection filtering and frame cadence
#[derive(Clone, Debug, Deserialize)]
pub struct PerceptionConfig {
    /// Boxes must be taller than this to count (pixels)
    #[serde(default = "default_min_box_height")]
    pub min_box_height: f32,

    /// Detections must be more confident than this
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Camera capture period (milliseconds)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

/// Camera intrinsics used to locate detections
#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_image_width")]
    pub width: u32,

    #[serde(default = "default_image_height")]
    pub height: u32,

    /// Horizontal field of view (degrees)
    #[serde(default = "default_horizontal_fov_deg")]
    pub horizontal_fov_deg: f32,
}

/// Decision/feedback rendezvous policy
#[derive(Clone, Debug, Deserialize)]
pub struct CoordinationConfig {
    /// Longest wait for an action's feedback (milliseconds)
    #[serde(default = "default_feedback_timeout_ms")]
    pub feedback_timeout_ms: u64,

    /// Prompts allowed per decision before giving up on an invalid reply
    #[serde(default = "default_max_decision_retries")]
    pub max_decision_retries: u32,

    /// Upper bound on actions requested in one decision episode
    #[serde(default = "default_max_actions_per_episode")]
    pub max_actions_per_episode: usize,
}

/// Action behaviour tuning
#[derive(Clone, Debug, Deserialize)]
pub struct ActionsConfig {
    /// Label the rescue actions look for
    #[serde(default = "default_target_label")]
    pub target_label: String,

    /// Real-world height of the target (meters), for range estimation
    #[serde(default = "default_target_height")]
    pub target_height: f32,

    /// Box height at which `moveto` considers itself arrived (pixels)
    #[serde(default = "default_arrival_box_height")]
    pub arrival_box_height: f32,

    /// Consecutive frames without a sighting before `moveto` gives up
    #[serde(default = "default_max_missed_frames")]
    pub max_missed_frames: u32,

    /// Radius of the `seek` search pattern (meters)
    #[serde(default = "default_seek_radius")]
    pub seek_radius: f32,

    /// Step budget for any obstacle-aware approach inside an action
    #[serde(default = "default_max_approach_steps")]
    pub max_approach_steps: u32,
}

/// Vertical cylinder obstacle in the simulated world
#[derive(Clone, Debug, Deserialize)]
pub struct ObstacleSpec {
    pub north: f32,
    pub east: f32,
    pub radius: f32,
}

/// Person standing in the simulated world
#[derive(Clone, Debug, Deserialize)]
pub struct PersonSpec {
    pub north: f32,
    pub east: f32,
}

/// Kinematic simulation used by the binary and integration tests
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Wall-clock seconds slept per simulated second of motion (0 = instant)
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,

    /// Starting position [north, east, down]
    #[serde(default = "default_start")]
    pub start: [f32; 3],

    /// Longest distance a single move command covers before timing out (meters)
    #[serde(default = "default_max_move_distance")]
    pub max_move_distance: f32,

    /// Lidar rays per revolution
    #[serde(default = "default_lidar_rays")]
    pub lidar_rays: usize,

    /// Lidar maximum range (meters)
    #[serde(default = "default_lidar_range")]
    pub lidar_range: f32,

    /// Vertical offset reported for lidar returns (meters, down positive)
    #[serde(default = "default_lidar_return_down")]
    pub lidar_return_down: f32,

    /// Confidence reported by the simulated detector
    #[serde(default = "default_detection_confidence")]
    pub detection_confidence: f32,

    #[serde(default = "default_obstacles")]
    pub obstacles: Vec<ObstacleSpec>,

    #[serde(default = "default_people")]
    pub people: Vec<PersonSpec>,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            detection_radius: default_detection_radius(),
            band_center: default_band_center(),
            band_half_width: default_band_half_width(),
            step_length: default_step_length(),
            waypoint_tolerance: default_waypoint_tolerance(),
            move_speed: default_move_speed(),
            action_poll_ms: default_action_poll_ms(),
            max_blocked_retries: default_max_blocked_retries(),
            hold_interval_ms: default_hold_interval_ms(),
            repeat_route: default_repeat_route(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            waypoints: default_waypoints(),
        }
    }
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            min_box_height: default_min_box_height(),
            min_confidence: default_min_confidence(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_image_width(),
            height: default_image_height(),
            horizontal_fov_deg: default_horizontal_fov_deg(),
        }
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            feedback_timeout_ms: default_feedback_timeout_ms(),
            max_decision_retries: default_max_decision_retries(),
            max_actions_per_episode: default_max_actions_per_episode(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            target_label: default_target_label(),
            target_height: default_target_height(),
            arrival_box_height: default_arrival_box_height(),
            max_missed_frames: default_max_missed_frames(),
            seek_radius: default_seek_radius(),
            max_approach_steps: default_max_approach_steps(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            start: default_start(),
            max_move_distance: default_max_move_distance(),
            lidar_rays: default_lidar_rays(),
            lidar_range: default_lidar_range(),
            lidar_return_down: default_lidar_return_down(),
            detection_confidence: default_detection_confidence(),
            obstacles: default_obstacles(),
            people: default_people(),
        }
    }
}

// Navigation defaults
fn default_detection_radius() -> f32 {
    1.5
}
fn default_band_center() -> f32 {
    0.5
}
fn default_band_half_width() -> f32 {
    0.5
}
fn default_step_length() -> f32 {
    0.7
}
fn default_waypoint_tolerance() -> f32 {
    1.0
}
fn default_move_speed() -> f32 {
    2.0
}
fn default_action_poll_ms() -> u64 {
    500
}
fn default_max_blocked_retries() -> u32 {
    5
}
fn default_hold_interval_ms() -> u64 {
    200
}
fn default_repeat_route() -> bool {
    true
}

// 14m square patrol at 5m altitude, east leg first
fn default_waypoints() -> Vec<[f32; 3]> {
    vec![
        [0.0, 14.0, -5.0],
        [14.0, 14.0, -5.0],
        [14.0, 0.0, -5.0],
        [0.0, 0.0, -5.0],
    ]
}

// Perception defaults
fn default_min_box_height() -> f32 {
    120.0
}
fn default_min_confidence() -> f32 {
    0.5
}
fn default_frame_interval_ms() -> u64 {
    500
}
fn default_image_width() -> u32 {
    1920
}
fn default_image_height() -> u32 {
    1080
}
fn default_horizontal_fov_deg() -> f32 {
    50.0
}

// Coordination defaults
fn default_feedback_timeout_ms() -> u64 {
    60_000
}
fn default_max_decision_retries() -> u32 {
    3
}
fn default_max_actions_per_episode() -> usize {
    16
}

// Action defaults
fn default_target_label() -> String {
    "person".to_string()
}
fn default_target_height() -> f32 {
    1.6
}
fn default_arrival_box_height() -> f32 {
    500.0
}
fn default_max_missed_frames() -> u32 {
    10
}
fn default_seek_radius() -> f32 {
    2.0
}
fn default_max_approach_steps() -> u32 {
    40
}

// Simulation defaults
fn default_time_scale() -> f32 {
    0.25
}
fn default_start() -> [f32; 3] {
    [0.0, 0.0, -5.0]
}
fn default_max_move_distance() -> f32 {
    5.0
}
fn default_lidar_rays() -> usize {
    360
}
fn default_lidar_range() -> f32 {
    4.0
}
fn default_lidar_return_down() -> f32 {
    0.5
}
fn default_detection_confidence() -> f32 {
    0.9
}
fn default_obstacles() -> Vec<ObstacleSpec> {
    vec![
        ObstacleSpec {
            north: 7.0,
            east: 14.0,
            radius: 0.5,
        },
        ObstacleSpec {
            north: 14.0,
            east: 7.0,
            radius: 0.4,
        },
    ]
}
fn default_people() -> Vec<PersonSpec> {
    vec![PersonSpec {
        north: 11.0,
        east: 16.0,
    }]
}

impl GarudaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GarudaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: GarudaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the planner and coordinator cannot work with.
    pub fn validate(&self) -> Result<()> {
        let nav = &self.navigation;
        if nav.detection_radius <= 0.0 {
            return Err(GarudaError::Config(
                "navigation.detection_radius must be positive".into(),
            ));
        }
        if nav.band_half_width <= 0.0 {
            return Err(GarudaError::Config(
                "navigation.band_half_width must be positive".into(),
            ));
        }
        if nav.step_length <= 0.0 {
            return Err(GarudaError::Config(
                "navigation.step_length must be positive".into(),
            ));
        }
        if nav.waypoint_tolerance <= 0.0 {
            return Err(GarudaError::Config(
                "navigation.waypoint_tolerance must be positive".into(),
            ));
        }
        if nav.move_speed <= 0.0 {
            return Err(GarudaError::Config(
                "navigation.move_speed must be positive".into(),
            ));
        }
        if self.route.waypoints.is_empty() {
            return Err(GarudaError::Config(
                "route.waypoints must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.perception.min_confidence) {
            return Err(GarudaError::Config(
                "perception.min_confidence must be within [0, 1]".into(),
            ));
        }
        if self.camera.horizontal_fov_deg <= 0.0 || self.camera.horizontal_fov_deg >= 180.0 {
            return Err(GarudaError::Config(
                "camera.horizontal_fov_deg must be within (0, 180)".into(),
            ));
        }
        if self.coordination.max_decision_retries == 0 {
            return Err(GarudaError::Config(
                "coordination.max_decision_retries must be at least 1".into(),
            ));
        }
        if self.coordination.feedback_timeout_ms == 0 {
            return Err(GarudaError::Config(
                "coordination.feedback_timeout_ms must be positive".into(),
            ));
        }
        if self.coordination.max_actions_per_episode == 0 {
            return Err(GarudaError::Config(
                "coordination.max_actions_per_episode must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Route as positions, in traversal order.
    pub fn waypoints(&self) -> Vec<Position> {
        self.route.waypoints.iter().copied().map(Position::from).collect()
    }

    pub fn planner(&self) -> Planner {
        Planner::new(
            ObstacleFilter {
                detection_radius: self.navigation.detection_radius,
                band_center: self.navigation.band_center,
                band_half_width: self.navigation.band_half_width,
            },
            self.navigation.step_length,
        )
    }

    pub fn camera_model(&self) -> CameraModel {
        CameraModel::new(
            self.camera.width,
            self.camera.height,
            self.camera.horizontal_fov_deg,
        )
    }

    pub fn feedback_timeout(&self) -> Duration {
        Duration::from_millis(self.coordination.feedback_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GarudaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.navigation.detection_radius, 1.5);
        assert_eq!(config.navigation.waypoint_tolerance, 1.0);
        assert_eq!(config.perception.min_box_height, 120.0);
        assert_eq!(config.waypoints().len(), 4);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: GarudaConfig = toml::from_str(
            r#"
            [navigation]
            step_length = 1.0

            [route]
            waypoints = [[5.0, 0.0, -1.0]]
            "#,
        )
        .unwrap();

        assert_eq!(config.navigation.step_length, 1.0);
        assert_eq!(config.navigation.detection_radius, 1.5);
        assert_eq!(config.waypoints(), vec![Position::new(5.0, 0.0, -1.0)]);
        assert_eq!(config.coordination.max_decision_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = GarudaConfig::default();
        config.route.waypoints.clear();
        assert!(matches!(config.validate(), Err(GarudaError::Config(_))));

        let mut config = GarudaConfig::default();
        config.navigation.step_length = 0.0;
        assert!(config.validate().is_err());

        let mut config = GarudaConfig::default();
        config.perception.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = GarudaConfig::default();
        config.coordination.feedback_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(GarudaError::Config(_))));

        let mut config = GarudaConfig::default();
        config.coordination.max_actions_per_episode = 0;
        assert!(matches!(config.validate(), Err(GarudaError::Config(_))));
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let config: GarudaConfig = toml::from_str(include_str!("../garuda.toml")).unwrap();
        assert!(config.validate().is_ok());

        let defaults = GarudaConfig::default();
        assert_eq!(config.route.waypoints, defaults.route.waypoints);
        assert_eq!(config.navigation.step_length, defaults.navigation.step_length);
        assert_eq!(config.actions.target_label, defaults.actions.target_label);
        assert_eq!(config.simulation.obstacles.len(), 2);
    }

    #[test]
    fn test_simulation_world_from_toml() {
        let config: GarudaConfig = toml::from_str(
            r#"
            [simulation]
            time_scale = 0.0
            obstacles = [{ north = 5.0, east = 0.0, radius = 0.5 }]
            people = []
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.time_scale, 0.0);
        assert_eq!(config.simulation.obstacles.len(), 1);
        assert!(config.simulation.people.is_empty());
        assert_eq!(config.simulation.lidar_rays, 360);
    }
}
