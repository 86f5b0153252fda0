//! GarudaNav - simulated search-and-rescue patrol
//!
//! Runs the full pipeline against the kinematic simulation:
//!
//! - **Camera Thread**: captures frames into the latest-frame slot
//! - **Perception Thread**: detects people and drives decision episodes
//! - **Navigation Thread**: patrols the route and executes actions

use garuda_nav::config::GarudaConfig;
use garuda_nav::decision::ScriptedRescue;
use garuda_nav::error::Result;
use garuda_nav::shared::{MissionStats, SharedState};
use garuda_nav::sim::{SimDetector, SimWorld};
use garuda_nav::threads::{Collaborators, spawn_pipeline};
use garuda_nav::{DroneControl, GarudaError, Position};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("garuda_nav=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let config = if args.len() > 1 {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        GarudaConfig::load(config_path)?
    } else if Path::new("garuda.toml").exists() {
        info!("Loading configuration from garuda.toml");
        GarudaConfig::load(Path::new("garuda.toml"))?
    } else {
        info!("Using default configuration");
        GarudaConfig::default()
    };

    info!("GarudaNav v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Patrol: {} waypoints, step {:.2}m, detection radius {:.2}m",
        config.route.waypoints.len(),
        config.navigation.step_length,
        config.navigation.detection_radius
    );

    let shared_state = Arc::new(SharedState::new());
    install_signal_handler(Arc::clone(&shared_state))?;

    // Caller-side setup: bring the vehicle to patrol altitude
    let world = SimWorld::new(&config);
    let mut drone = world.drone();
    let start = drone.current_position()?;
    let patrol_down = config
        .waypoints()
        .first()
        .map(|w| w.down)
        .unwrap_or(start.down);
    drone.move_to(
        Position::new(start.north, start.east, patrol_down),
        config.navigation.move_speed,
    )?;
    drone.hover()?;
    info!(
        "Hovering at ({:.1}, {:.1}, {:.1})",
        start.north, start.east, patrol_down
    );

    let collaborators = Collaborators {
        drone: Box::new(drone),
        camera: Box::new(world.camera()),
        detector: Arc::new(SimDetector::new(world.clone())),
        decision: Box::new(ScriptedRescue::new(config.actions.target_label.clone())),
    };

    info!("Starting pipeline...");
    let started = Instant::now();
    let handles = spawn_pipeline(config, collaborators, Arc::clone(&shared_state))?;

    // Main thread: monitor and wait for completion
    let check_interval = Duration::from_millis(500);
    let status_interval = Duration::from_secs(5);
    let mut last_status = Instant::now();
    loop {
        std::thread::sleep(check_interval);

        if last_status.elapsed() >= status_interval {
            let stats = &shared_state.stats;
            let p = world.position();
            info!(
                "Status: at ({:.1}, {:.1}, {:.1}), {} steps, {} waypoints, {} frames ({} dropped), {} actions",
                p.north,
                p.east,
                p.down,
                MissionStats::get(&stats.steps),
                MissionStats::get(&stats.waypoints_reached),
                MissionStats::get(&stats.frames_captured),
                MissionStats::get(&stats.frames_dropped),
                MissionStats::get(&stats.actions_executed)
            );
            last_status = Instant::now();
        }

        if let Some(reason) = shared_state.fault() {
            error!("Mission fault: {}", reason);
            break;
        }
        if shared_state.is_route_complete() {
            info!("Route completed");
            break;
        }
        if shared_state.should_shutdown() {
            info!("Shutdown requested");
            break;
        }
        if handles.any_finished() {
            warn!("A worker thread exited unexpectedly");
            break;
        }
    }

    shared_state.signal_shutdown();
    info!("Waiting for threads to finish...");
    handles.join();

    // Navigation hovers on exit; make sure through a fresh handle as well
    if let Err(e) = world.drone().hover() {
        warn!("Final hover failed: {}", e);
    }

    log_statistics(&shared_state, &world, started.elapsed());

    match shared_state.fault() {
        Some(reason) => Err(GarudaError::Drone(reason)),
        None => {
            info!("GarudaNav finished");
            Ok(())
        }
    }
}

/// Set the shutdown flag on SIGINT/SIGTERM.
fn install_signal_handler(shared_state: Arc<SharedState>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("signal".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {:?}, initiating shutdown...", sig);
                shared_state.signal_shutdown();
            }
        })?;
    Ok(())
}

fn log_statistics(shared_state: &SharedState, world: &SimWorld, elapsed: Duration) {
    let stats = &shared_state.stats;
    info!("Mission time: {:.1}s", elapsed.as_secs_f32());
    info!(
        "Navigation: {} steps ({} detours), {} holds, {} waypoints reached, {} skipped",
        MissionStats::get(&stats.steps),
        MissionStats::get(&stats.detour_steps),
        MissionStats::get(&stats.blocked_holds),
        MissionStats::get(&stats.waypoints_reached),
        MissionStats::get(&stats.waypoints_skipped)
    );
    if let Some(reason) = shared_state.last_navigation_fault() {
        warn!(
            "Navigation faults: {} (last: {})",
            MissionStats::get(&stats.navigation_faults),
            reason
        );
    }
    info!(
        "Perception: {} frames ({} dropped), {} episodes",
        MissionStats::get(&stats.frames_captured),
        MissionStats::get(&stats.frames_dropped),
        MissionStats::get(&stats.episodes)
    );
    info!(
        "Actions: {} requested, {} executed, {} feedback timeouts",
        MissionStats::get(&stats.actions_requested),
        MissionStats::get(&stats.actions_executed),
        MissionStats::get(&stats.feedback_timeouts)
    );
    info!(
        "Flight: {:.1}m travelled, minimum obstacle clearance {:.2}m",
        world.distance_travelled(),
        world.min_clearance()
    );
}
