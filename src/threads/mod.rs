//! Multi-threaded pipeline for GarudaNav.
//!
//! Separates concerns into three threads:
//! - Camera thread: fixed-cadence capture into the latest-frame slot
//! - Perception thread: detection, novelty gating, decision episodes
//! - Navigation thread: patrol loop and action execution
//!
//! The frame, action and feedback channels are the only data paths between
//! them; `SharedState` carries lifecycle flags and counters only.

mod camera;
mod navigation;
mod perception;

pub use camera::CameraThread;
pub use navigation::NavigationThread;
pub use perception::{EpisodeOutcome, PerceptionThread};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::actions::ActionCoordinator;
use crate::channels::{action_channel, feedback_channel, frame_channel};
use crate::collaborators::{Camera, DecisionMaker, Detector, DroneControl};
use crate::config::GarudaConfig;
use crate::decision::DecisionSession;
use crate::error::Result;
use crate::navigation::NavigationLoop;
use crate::shared::SharedState;

/// Externally constructed collaborator handles injected at startup.
pub struct Collaborators {
    pub drone: Box<dyn DroneControl>,
    pub camera: Box<dyn Camera>,
    pub detector: Arc<dyn Detector>,
    pub decision: Box<dyn DecisionMaker>,
}

/// Thread handles for the pipeline.
pub struct PipelineHandles {
    pub camera: JoinHandle<()>,
    pub perception: JoinHandle<()>,
    pub navigation: JoinHandle<()>,
}

impl PipelineHandles {
    /// True once every thread has exited.
    pub fn all_finished(&self) -> bool {
        self.camera.is_finished() && self.perception.is_finished() && self.navigation.is_finished()
    }

    pub fn any_finished(&self) -> bool {
        self.camera.is_finished() || self.perception.is_finished() || self.navigation.is_finished()
    }

    /// Join all threads, logging any that panicked.
    pub fn join(self) {
        for (name, handle) in [
            ("camera", self.camera),
            ("perception", self.perception),
            ("navigation", self.navigation),
        ] {
            if handle.join().is_err() {
                tracing::error!("{} thread panicked", name);
            }
        }
    }
}

/// Wire the channels and spawn all threads.
pub fn spawn_pipeline(
    config: GarudaConfig,
    collaborators: Collaborators,
    shared_state: Arc<SharedState>,
) -> Result<PipelineHandles> {
    config.validate()?;

    let (frame_tx, frame_rx) = frame_channel();
    let (action_tx, action_rx) = action_channel();
    let (feedback_tx, feedback_rx) = feedback_channel();

    let Collaborators {
        drone,
        camera,
        detector,
        decision,
    } = collaborators;

    // Build the stateful parts up front so configuration errors surface here
    let coordinator = ActionCoordinator::new(&config, Arc::clone(&detector), feedback_tx);
    let nav = NavigationLoop::new(&config, drone, coordinator, action_rx)?;
    let session = DecisionSession::new(decision, config.coordination.max_decision_retries);
    let mut perception = PerceptionThread::new(
        &config,
        frame_rx,
        detector,
        session,
        action_tx,
        feedback_rx,
        Arc::clone(&shared_state),
    );
    let mut camera_thread = CameraThread::new(
        camera,
        frame_tx,
        Arc::clone(&shared_state),
        Duration::from_millis(config.perception.frame_interval_ms),
    );
    let mut navigation = NavigationThread::new(nav, Arc::clone(&shared_state));

    let camera_state = Arc::clone(&shared_state);
    let camera_handle = thread::Builder::new()
        .name("camera".into())
        .spawn(move || {
            if let Err(e) = camera_thread.run() {
                tracing::error!("Camera thread error: {}", e);
                camera_state.trigger_fault(e.to_string());
            }
        })?;

    let perception_state = Arc::clone(&shared_state);
    let perception_handle = thread::Builder::new()
        .name("perception".into())
        .spawn(move || {
            if let Err(e) = perception.run() {
                tracing::error!("Perception thread error: {}", e);
                perception_state.trigger_fault(e.to_string());
            }
        })?;

    let navigation_handle = thread::Builder::new()
        .name("navigation".into())
        .spawn(move || navigation.run())?;

    Ok(PipelineHandles {
        camera: camera_handle,
        perception: perception_handle,
        navigation: navigation_handle,
    })
}
