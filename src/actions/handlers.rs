//! Action behaviours.
//!
//! Each handler runs to completion on the navigation thread, owning the
//! vehicle for its whole duration, and reports one outcome.

use tracing::{debug, info};

use super::{Action, ActionOutcome};
use crate::collaborators::{Detection, Detector, DroneControl, Frame};
use crate::config::ActionsConfig;
use crate::error::Result;
use crate::geometry::{Position, normalize_bearing, offset_position};
use crate::perception::CameraModel;
use crate::planning::Planner;

/// Everything a handler may use while it holds control.
pub struct ActionContext<'a> {
    pub drone: &'a mut dyn DroneControl,
    pub detector: &'a dyn Detector,
    pub planner: &'a Planner,
    pub camera: &'a CameraModel,
    pub config: &'a ActionsConfig,
    pub move_speed: f32,
    /// Distance at which an approach target counts as reached
    pub arrival_tolerance: f32,
}

impl ActionContext<'_> {
    /// Take one obstacle-aware step toward `target`. Hovers when boxed in.
    ///
    /// Returns false when no heading was feasible.
    pub fn step_toward(&mut self, target: Position) -> Result<bool> {
        let current = self.drone.current_position()?;
        let scan = self.drone.range_scan()?;
        match self.planner.plan(&current, &target, &scan) {
            Some(step) => {
                self.drone.move_to(step.next, self.move_speed)?;
                Ok(true)
            }
            None => {
                self.drone.hover()?;
                Ok(false)
            }
        }
    }

    /// Fly to `target` around obstacles, within the approach step budget.
    pub fn travel_to(&mut self, target: Position) -> Result<bool> {
        for _ in 0..self.config.max_approach_steps {
            let current = self.drone.current_position()?;
            if current.planar_distance(&target) < self.arrival_tolerance {
                return Ok(true);
            }
            self.step_toward(target)?;
        }
        let current = self.drone.current_position()?;
        Ok(current.planar_distance(&target) < self.arrival_tolerance)
    }

    /// Tallest sighting of the target label in a fresh frame, if any.
    pub fn look_for_target(&mut self) -> Result<Option<(Frame, Detection)>> {
        let frame = self.drone.capture_frame()?;
        let sighting = self
            .detector
            .detect(&frame)?
            .into_iter()
            .filter(|d| d.label == self.config.target_label)
            .max_by(|a, b| a.bbox.height().total_cmp(&b.bbox.height()));
        Ok(sighting.map(|d| (frame, d)))
    }
}

/// A named behaviour the coordinator can run.
pub trait ActionHandler: Send {
    fn action(&self) -> Action;

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome>;
}

/// Handlers for the full action set.
pub fn default_handlers() -> Vec<Box<dyn ActionHandler>> {
    vec![
        Box::new(SeekHandler),
        Box::new(MoveToHandler),
        Box::new(BroadcastHandler),
        Box::new(DropHandler),
        Box::new(ConsoleHandler),
        Box::new(SeekNextHandler),
    ]
}

/// Visit four points around the current position, looking outward from each.
struct SeekHandler;

impl ActionHandler for SeekHandler {
    fn action(&self) -> Action {
        Action::Seek
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        let origin = ctx.drone.current_position()?;
        let start_heading = ctx.drone.current_heading()?;

        for quarter in 0..4 {
            let bearing = normalize_bearing(start_heading + 90.0 * quarter as f32);
            let probe = offset_position(origin, bearing, ctx.config.seek_radius);
            debug!("Seek: probing {:.0}° at ({:.1}, {:.1})", bearing, probe.north, probe.east);

            ctx.travel_to(probe)?;
            ctx.drone.turn_to(bearing)?;
            if let Some((frame, sighting)) = ctx.look_for_target()? {
                let (relative, range) = ctx.camera.locate(&sighting.bbox, ctx.config.target_height);
                let spot = offset_position(frame.position, frame.heading + relative, range);
                info!("Seek: {} sighted near ({:.1}, {:.1})", sighting.label, spot.north, spot.east);
                return Ok(ActionOutcome::resume(format!(
                    "Found a trapped {} near ({:.1}, {:.1}); choose the next action",
                    sighting.label, spot.north, spot.east
                )));
            }
        }

        Ok(ActionOutcome::resume(
            "No trapped person found nearby; choose the next action",
        ))
    }
}

/// Close in on the sighted target until its box is tall enough.
struct MoveToHandler;

impl ActionHandler for MoveToHandler {
    fn action(&self) -> Action {
        Action::MoveTo
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        let heading = ctx.drone.current_heading()?;
        let mut goal = offset_position(ctx.drone.current_position()?, heading, 1.0);
        let mut missed = 0;

        for _ in 0..ctx.config.max_approach_steps {
            match ctx.look_for_target()? {
                Some((frame, sighting)) => {
                    missed = 0;
                    if sighting.bbox.height() > ctx.config.arrival_box_height {
                        info!("MoveTo: arrived at {}", sighting.label);
                        return Ok(ActionOutcome::resume(format!(
                            "Arrived at the trapped {}; choose the next action",
                            sighting.label
                        )));
                    }
                    let (relative, range) =
                        ctx.camera.locate(&sighting.bbox, ctx.config.target_height);
                    goal = offset_position(frame.position, frame.heading + relative, range);
                    debug!(
                        "MoveTo: target at {:.1}m, bearing {:.1}°",
                        range,
                        normalize_bearing(frame.heading + relative)
                    );
                }
                None => {
                    missed += 1;
                    if missed >= ctx.config.max_missed_frames {
                        info!("MoveTo: target lost after {} frames", missed);
                        return Ok(ActionOutcome::resume(
                            "Lost sight of the trapped person; confirm and choose the next action",
                        ));
                    }
                }
            }

            let current = ctx.drone.current_position()?;
            if current.planar_distance(&goal) >= ctx.arrival_tolerance {
                ctx.step_toward(goal.with_down(current.down))?;
            }
        }

        Ok(ActionOutcome::resume(format!(
            "Could not reach the trapped person within {} steps; choose the next action",
            ctx.config.max_approach_steps
        )))
    }
}

/// Report the find to headquarters.
struct BroadcastHandler;

impl ActionHandler for BroadcastHandler {
    fn action(&self) -> Action {
        Action::Broadcast
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        let p = ctx.drone.current_position()?;
        info!(
            "Broadcast: trapped person located near ({:.1}, {:.1}, {:.1})",
            p.north, p.east, p.down
        );
        Ok(ActionOutcome::resume(format!(
            "Headquarters notified of a trapped person near ({:.1}, {:.1}); choose the next action",
            p.north, p.east
        )))
    }
}

struct DropHandler;

impl ActionHandler for DropHandler {
    fn action(&self) -> Action {
        Action::Drop
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        ctx.drone.hover()?;
        info!("Drop: releasing emergency supplies");
        Ok(ActionOutcome::resume(
            "Emergency supplies dropped; choose the next action",
        ))
    }
}

struct ConsoleHandler;

impl ActionHandler for ConsoleHandler {
    fn action(&self) -> Action {
        Action::Console
    }

    fn run(&mut self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        ctx.drone.hover()?;
        info!("Console: reassuring the trapped person");
        Ok(ActionOutcome::resume(
            "Trapped person reassured; choose the next action",
        ))
    }
}

/// Done with this person; abandon the current waypoint.
struct SeekNextHandler;

impl ActionHandler for SeekNextHandler {
    fn action(&self) -> Action {
        Action::SeekNext
    }

    fn run(&mut self, _ctx: &mut ActionContext<'_>) -> Result<ActionOutcome> {
        info!("SeekNext: person rescued, moving on");
        Ok(ActionOutcome::skip(
            "Person rescued; continuing the search for others",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GarudaConfig;
    use crate::sim::{SimDetector, SimWorld};

    fn config_with_people(people: &[(f32, f32)]) -> GarudaConfig {
        let mut config = GarudaConfig::default();
        config.simulation.time_scale = 0.0;
        config.simulation.start = [0.0, 0.0, -5.0];
        config.simulation.obstacles.clear();
        config.simulation.people = people
            .iter()
            .map(|&(north, east)| crate::config::PersonSpec { north, east })
            .collect();
        config
    }

    fn run_handler(
        handler: &mut dyn ActionHandler,
        config: &GarudaConfig,
        world: &SimWorld,
    ) -> ActionOutcome {
        let mut drone = world.drone();
        let detector = SimDetector::new(world.clone());
        let planner = config.planner();
        let camera = config.camera_model();
        let mut ctx = ActionContext {
            drone: &mut drone,
            detector: &detector,
            planner: &planner,
            camera: &camera,
            config: &config.actions,
            move_speed: config.navigation.move_speed,
            arrival_tolerance: config.navigation.waypoint_tolerance,
        };
        handler.run(&mut ctx).unwrap()
    }

    #[test]
    fn test_default_handlers_cover_every_action() {
        let handlers = default_handlers();
        for action in Action::ALL {
            assert_eq!(handlers.iter().filter(|h| h.action() == action).count(), 1);
        }
    }

    #[test]
    fn test_moveto_reaches_person_ahead() {
        let config = config_with_people(&[(20.0, 1.0)]);
        let world = SimWorld::new(&config);

        let outcome = run_handler(&mut MoveToHandler, &config, &world);

        assert!(outcome.message.starts_with("Arrived"));
        assert!(!outcome.skip_waypoint);
        let pos = world.position();
        let person = Position::new(20.0, 1.0, pos.down);
        assert!(pos.planar_distance(&person) < 7.0);
    }

    #[test]
    fn test_moveto_gives_up_without_sighting() {
        let config = config_with_people(&[]);
        let world = SimWorld::new(&config);

        let outcome = run_handler(&mut MoveToHandler, &config, &world);
        assert!(outcome.message.starts_with("Lost sight"));
    }

    #[test]
    fn test_seek_finds_person_behind() {
        // Person due east; the east probe faces it
        let config = config_with_people(&[(0.0, 10.0)]);
        let world = SimWorld::new(&config);

        let outcome = run_handler(&mut SeekHandler, &config, &world);
        assert!(outcome.message.starts_with("Found"), "{}", outcome.message);
    }

    #[test]
    fn test_seek_reports_nothing_found() {
        let config = config_with_people(&[]);
        let world = SimWorld::new(&config);

        let outcome = run_handler(&mut SeekHandler, &config, &world);
        assert!(outcome.message.starts_with("No trapped person"));
    }

    #[test]
    fn test_seek_next_requests_skip() {
        let config = config_with_people(&[]);
        let world = SimWorld::new(&config);

        let outcome = run_handler(&mut SeekNextHandler, &config, &world);
        assert!(outcome.skip_waypoint);
    }
}
