//! GarudaNav - obstacle-aware patrol with interruptible rescue actions
//!
//! The vehicle patrols a waypoint route in short steps, steering around
//! obstacles found by a range sensor. A perception/decision pipeline may
//! interrupt the patrol to run named actions; each action holds the vehicle
//! until it reports feedback, then patrol resumes or skips the waypoint.
//!
//! ## Modules
//!
//! - [`planning`]: 72-sector occupancy map, nearest-gap direction selector,
//!   step generator
//! - [`navigation`]: the patrol loop
//! - [`actions`]: action set, handlers and the coordinator
//! - [`decision`]: strict reply parsing and bounded re-prompting
//! - [`threads`]: camera, perception and navigation threads wired by channels
//! - [`sim`]: kinematic stand-ins for the external collaborators
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use garuda_nav::{
//!     Collaborators, GarudaConfig, ScriptedRescue, SharedState, SimDetector, SimWorld,
//!     spawn_pipeline,
//! };
//!
//! let config = GarudaConfig::default();
//! let world = SimWorld::new(&config);
//! let collaborators = Collaborators {
//!     drone: Box::new(world.drone()),
//!     camera: Box::new(world.camera()),
//!     detector: Arc::new(SimDetector::new(world.clone())),
//!     decision: Box::new(ScriptedRescue::new("person")),
//! };
//! let shared = Arc::new(SharedState::new());
//! let handles = spawn_pipeline(config, collaborators, Arc::clone(&shared)).unwrap();
//! shared.signal_shutdown();
//! handles.join();
//! ```

pub mod actions;
pub mod channels;
pub mod collaborators;
pub mod config;
pub mod decision;
pub mod error;
pub mod geometry;
pub mod navigation;
pub mod perception;
pub mod planning;
pub mod shared;
pub mod sim;
pub mod threads;

pub use actions::{Action, ActionCoordinator, ActionRequest, Feedback, FeedbackStatus};
pub use collaborators::{Camera, DecisionMaker, Detector, DroneControl, Frame, MoveStatus};
pub use config::GarudaConfig;
pub use decision::{DecisionSession, ScriptedRescue};
pub use error::{GarudaError, Result};
pub use geometry::{Position, ScanPoint};
pub use navigation::{NavigationLoop, StepOutcome};
pub use planning::{DirectionChoice, OccupancyMap, Planner, select_direction};
pub use shared::SharedState;
pub use sim::{SimDetector, SimWorld};
pub use threads::{Collaborators, PipelineHandles, spawn_pipeline};
