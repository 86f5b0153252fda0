//! Camera thread: captures frames at a fixed cadence into the latest-frame slot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channels::FramePublisher;
use crate::collaborators::Camera;
use crate::error::{GarudaError, Result};
use crate::shared::{MissionStats, SharedState};

/// Camera thread state and logic.
pub struct CameraThread {
    camera: Box<dyn Camera>,
    publisher: FramePublisher,
    shared_state: Arc<SharedState>,
    interval: Duration,
}

impl CameraThread {
    pub fn new(
        camera: Box<dyn Camera>,
        publisher: FramePublisher,
        shared_state: Arc<SharedState>,
        interval: Duration,
    ) -> Self {
        Self {
            camera,
            publisher,
            shared_state,
            interval,
        }
    }

    /// Run the capture loop until shutdown or the consumer goes away.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("Camera thread started ({:?} interval)", self.interval);

        loop {
            let loop_start = Instant::now();

            if self.shared_state.should_shutdown() {
                tracing::info!("Camera thread shutting down");
                break;
            }

            match self.camera.capture_frame() {
                Ok(frame) => {
                    MissionStats::bump(&self.shared_state.stats.frames_captured);
                    match self.publisher.publish(frame) {
                        Ok(true) => MissionStats::bump(&self.shared_state.stats.frames_dropped),
                        Ok(false) => {}
                        Err(GarudaError::ChannelClosed(_)) => {
                            tracing::info!("Frame consumer gone, camera thread exiting");
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!("Frame capture failed: {}", e),
            }

            let elapsed = loop_start.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }

        Ok(())
    }
}
