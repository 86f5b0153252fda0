//! Simulated detector: projects people inside the field of view.

use super::SimWorld;
use crate::collaborators::{Detection, Detector, Frame};
use crate::error::Result;
use crate::geometry::bearing_difference;

pub struct SimDetector {
    world: SimWorld,
}

impl SimDetector {
    pub fn new(world: SimWorld) -> Self {
        Self { world }
    }
}

impl Detector for SimDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        let params = &self.world.params;
        let detections = self
            .world
            .people_from(&frame.position)
            .into_iter()
            .filter_map(|(bearing, distance)| {
                let relative = bearing_difference(frame.heading, bearing);
                params
                    .camera
                    .project(relative, distance, params.target_height)
                    .map(|bbox| Detection {
                        label: params.target_label.clone(),
                        bbox,
                        confidence: params.detection_confidence,
                    })
            })
            .collect();
        Ok(detections)
    }
}
