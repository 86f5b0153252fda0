//! Navigation Integration Tests
//!
//! Drives the patrol loop against the kinematic simulation:
//! - Straight-line obstacle avoidance with lateral clearance
//! - Continuous patrol of the default square route
//! - Occupancy/selector properties over real ray-cast scans
//!
//! Run with: `cargo test --test navigation`

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use garuda_nav::actions::ActionCoordinator;
use garuda_nav::channels::{action_channel, feedback_channel};
use garuda_nav::config::{GarudaConfig, ObstacleSpec};
use garuda_nav::geometry::{SECTOR_COUNT, sector_bearing};
use garuda_nav::planning::{ObstacleFilter, OccupancyMap, select_direction, select_from_bearing};
use garuda_nav::{DroneControl, NavigationLoop, Position, SimDetector, SimWorld, StepOutcome};

// ============================================================================
// Helpers
// ============================================================================

fn config(waypoints: Vec<[f32; 3]>, obstacles: Vec<ObstacleSpec>) -> GarudaConfig {
    let mut config = GarudaConfig::default();
    config.route.waypoints = waypoints;
    config.navigation.action_poll_ms = 1;
    config.navigation.hold_interval_ms = 0;
    config.navigation.repeat_route = false;
    config.simulation.time_scale = 0.0;
    config.simulation.start = [0.0, 0.0, -1.0];
    config.simulation.obstacles = obstacles;
    config.simulation.people.clear();
    config
}

fn build(config: &GarudaConfig) -> (NavigationLoop, SimWorld) {
    let world = SimWorld::new(config);
    let (_action_tx, action_rx) = action_channel();
    let (feedback_tx, _feedback_rx) = feedback_channel();
    let coordinator =
        ActionCoordinator::new(config, Arc::new(SimDetector::new(world.clone())), feedback_tx);
    let nav = NavigationLoop::new(config, Box::new(world.drone()), coordinator, action_rx)
        .expect("valid route");
    (nav, world)
}

/// Step until the route completes, collecting outcomes.
fn fly(nav: &mut NavigationLoop, max_steps: usize) -> Vec<StepOutcome> {
    let mut outcomes = Vec::new();
    for _ in 0..max_steps {
        let outcome = nav.step().expect("no navigation fault");
        outcomes.push(outcome);
        if outcome == StepOutcome::RouteComplete {
            break;
        }
    }
    outcomes
}

// ============================================================================
// Obstacle avoidance
// ============================================================================

#[test]
fn test_detours_around_obstacle_on_direct_line() {
    let config = config(
        vec![[10.0, 0.0, -1.0]],
        vec![ObstacleSpec {
            north: 5.0,
            east: 0.0,
            radius: 0.5,
        }],
    );
    let (mut nav, world) = build(&config);

    let outcomes = fly(&mut nav, 60);

    assert_eq!(outcomes.last(), Some(&StepOutcome::RouteComplete));
    assert!(outcomes.contains(&StepOutcome::WaypointReached { index: 0 }));
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, StepOutcome::Moved { detour: true, .. })),
        "expected at least one detour step"
    );
    assert!(outcomes.len() <= 40, "took {} steps", outcomes.len());
    assert!(
        world.min_clearance() > 0.5,
        "clearance {:.2}m",
        world.min_clearance()
    );

    let end = world.position();
    assert!(end.planar_distance(&Position::new(10.0, 0.0, -1.0)) < 1.0);
}

#[test]
fn test_clear_route_flies_straight() {
    let config = config(vec![[0.0, 7.0, -3.0]], Vec::new());
    let (mut nav, world) = build(&config);

    let outcomes = fly(&mut nav, 30);

    for outcome in &outcomes {
        if let StepOutcome::Moved { heading, detour } = outcome {
            assert!(!detour);
            assert_abs_diff_eq!(*heading, 90.0, epsilon = 1e-3);
        }
    }
    // 7m at 0.7m per step, stopping inside the 1m tolerance
    let moves = outcomes
        .iter()
        .filter(|o| matches!(o, StepOutcome::Moved { .. }))
        .count();
    assert_eq!(moves, 9);
    assert_eq!(world.position().down, -3.0);
}

#[test]
fn test_default_patrol_completes_square() {
    let mut config = GarudaConfig::default();
    config.navigation.action_poll_ms = 1;
    config.navigation.repeat_route = false;
    config.simulation.time_scale = 0.0;
    config.simulation.people.clear();
    let (mut nav, world) = build(&config);

    let outcomes = fly(&mut nav, 200);

    let reached: Vec<usize> = outcomes
        .iter()
        .filter_map(|o| match o {
            StepOutcome::WaypointReached { index } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(reached, vec![0, 1, 2, 3]);
    assert!(world.min_clearance() > 0.5);
}

#[test]
fn test_repeat_route_wraps_to_first_waypoint() {
    let mut config = config(vec![[2.0, 0.0, -1.0], [2.0, 2.0, -1.0]], Vec::new());
    config.navigation.repeat_route = true;
    let (mut nav, _world) = build(&config);

    let mut reached = Vec::new();
    for _ in 0..50 {
        if let StepOutcome::WaypointReached { index } = nav.step().unwrap() {
            reached.push(index);
            if reached.len() == 4 {
                break;
            }
        }
    }
    assert_eq!(reached, vec![0, 1, 0, 1]);
}

// ============================================================================
// Map and selector over simulated scans
// ============================================================================

#[test]
fn test_isolated_obstacle_marks_contiguous_arc() {
    let config = config(
        vec![[10.0, 0.0, -1.0]],
        vec![ObstacleSpec {
            north: 0.0,
            east: 1.2,
            radius: 0.1,
        }],
    );
    let world = SimWorld::new(&config);
    let scan = world.drone().range_scan().unwrap();
    let map = OccupancyMap::from_scan(&scan, &ObstacleFilter::default());

    // Centred on the east sector and no wider than the inflated arc of the
    // outermost returns
    assert!(map.count(18) > 0);
    assert!(map.is_clear(54));
    assert!(map.is_clear(40));
    let blocked = (0..SECTOR_COUNT).filter(|&i| !map.is_clear(i)).count();
    assert!((37..=45).contains(&blocked), "{} sectors blocked", blocked);
}

#[test]
fn test_selector_scenarios() {
    let clear = OccupancyMap::clear();
    let direct = select_from_bearing(50.0, &clear).unwrap();
    assert_eq!(direct.sector, 10);
    assert_abs_diff_eq!(direct.heading, sector_bearing(10), epsilon = 1e-6);

    let mut counts = [0u32; SECTOR_COUNT];
    for sector in 8..=12 {
        counts[sector] = 1;
    }
    let blocked = OccupancyMap::from_counts(counts);
    let detour = select_from_bearing(50.0, &blocked).unwrap();
    assert_eq!(detour.sector, 13);
    assert_abs_diff_eq!(detour.heading, 65.0, epsilon = 1e-6);

    // Repeated runs agree
    for _ in 0..10 {
        assert_eq!(select_from_bearing(50.0, &blocked).unwrap(), detour);
    }

    let full = OccupancyMap::from_counts([1; SECTOR_COUNT]);
    assert!(
        select_direction(
            &Position::new(0.0, 0.0, 0.0),
            &Position::new(5.0, 5.0, 0.0),
            &full
        )
        .is_none()
    );
}
