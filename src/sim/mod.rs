//! Kinematic simulation of the collaborators for hardware-free runs.
//!
//! | Collaborator | Simulation Method |
//! |--------------|-------------------|
//! | Drone control | Straight-line teleport with a per-command travel budget |
//! | Range sensor | Ray-casting against vertical cylinder obstacles |
//! | Camera | Synthetic frames stamped with the vehicle pose |
//! | Detector | Pinhole projection of people in the field of view |
//!
//! There are no flight dynamics: a move lands exactly on its target (or on
//! the budget limit along the segment) after sleeping for the travel time
//! scaled by `time_scale`.
//!
//! ```toml
//! [simulation]
//! time_scale = 0.25
//! start = [0.0, 0.0, -5.0]
//! obstacles = [{ north = 7.0, east = 14.0, radius = 0.5 }]
//! people = [{ north = 11.0, east = 16.0 }]
//! ```

mod detector;
mod drone;
mod world;

pub use detector::SimDetector;
pub use drone::{SimCamera, SimDrone};
pub use world::{Cylinder, SimWorld};
