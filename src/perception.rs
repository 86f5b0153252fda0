//! Detection filtering, novelty tracking and the camera model.

use std::collections::BTreeSet;

use crate::collaborators::{BoundingBox, Detection};

/// Label always considered present, so an empty scene is never novel.
pub const BACKGROUND_LABEL: &str = "background";

/// Minimum size and confidence for a detection to count.
#[derive(Clone, Debug)]
pub struct DetectionFilter {
    /// Pixels
    pub min_box_height: f32,
    pub min_confidence: f32,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            min_box_height: 120.0,
            min_confidence: 0.5,
        }
    }
}

impl DetectionFilter {
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.bbox.height() > self.min_box_height && detection.confidence > self.min_confidence
    }

    /// Labels of accepted detections, plus the background label.
    pub fn labels(&self, detections: &[Detection]) -> BTreeSet<String> {
        let mut labels: BTreeSet<String> = detections
            .iter()
            .filter(|d| self.accepts(d))
            .map(|d| d.label.clone())
            .collect();
        labels.insert(BACKGROUND_LABEL.to_string());
        labels
    }
}

/// Remembers which labels the decision process has already ruled on.
#[derive(Clone, Debug)]
pub struct LabelTracker {
    known: BTreeSet<String>,
}

impl Default for LabelTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelTracker {
    pub fn new() -> Self {
        Self {
            known: BTreeSet::from([BACKGROUND_LABEL.to_string()]),
        }
    }

    /// True when `labels` contains something not already explained.
    pub fn is_novel(&self, labels: &BTreeSet<String>) -> bool {
        !labels.is_subset(&self.known)
    }

    /// Replace the known set with the scene the decision process just handled.
    pub fn mark_known(&mut self, labels: BTreeSet<String>) {
        self.known = labels;
        self.known.insert(BACKGROUND_LABEL.to_string());
    }

    pub fn known(&self) -> &BTreeSet<String> {
        &self.known
    }
}

/// Pinhole camera facing along the vehicle heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    pub width: u32,
    pub height: u32,
    pub horizontal_fov_deg: f32,
}

impl CameraModel {
    pub fn new(width: u32, height: u32, horizontal_fov_deg: f32) -> Self {
        Self {
            width,
            height,
            horizontal_fov_deg,
        }
    }

    /// Focal length in pixels (square pixels assumed).
    pub fn focal_px(&self) -> f32 {
        (self.width as f32 / 2.0) / (self.horizontal_fov_deg / 2.0).to_radians().tan()
    }

    /// Bearing offset from the optical axis (degrees, clockwise positive)
    /// and range (meters) of an object of known height.
    pub fn locate(&self, bbox: &BoundingBox, object_height: f32) -> (f32, f32) {
        let focal = self.focal_px();
        let offset = bbox.center_x() - self.width as f32 / 2.0;
        let relative_bearing = (offset / focal).atan().to_degrees();
        let range = object_height * focal / bbox.height().max(1.0);
        (relative_bearing, range)
    }

    /// Box an upright object would occupy, or `None` when it is out of view.
    pub fn project(
        &self,
        relative_bearing: f32,
        distance: f32,
        object_height: f32,
    ) -> Option<BoundingBox> {
        if distance <= 0.0 || relative_bearing.abs() >= self.horizontal_fov_deg / 2.0 {
            return None;
        }

        let focal = self.focal_px();
        let center_x = self.width as f32 / 2.0 + focal * relative_bearing.to_radians().tan();
        let box_height = object_height * focal / distance;
        let box_width = box_height * 0.4;
        let center_y = self.height as f32 / 2.0;

        Some(BoundingBox::new(
            center_x - box_width / 2.0,
            center_y - box_height / 2.0,
            center_x + box_width / 2.0,
            center_y + box_height / 2.0,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn detection(label: &str, height: f32, confidence: f32) -> Detection {
        Detection {
            label: label.to_string(),
            bbox: BoundingBox::new(0.0, 0.0, 50.0, height),
            confidence,
        }
    }

    #[test]
    fn test_filter_drops_small_and_unsure_boxes() {
        let filter = DetectionFilter::default();
        let labels = filter.labels(&[
            detection("person", 200.0, 0.9),
            detection("dog", 100.0, 0.9),
            detection("car", 300.0, 0.4),
            detection("tree", 120.0, 0.9),
        ]);

        let expected: BTreeSet<String> = ["background", "person"].iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn test_novelty_only_for_unexplained_labels() {
        let filter = DetectionFilter::default();
        let mut tracker = LabelTracker::new();

        let empty = filter.labels(&[]);
        assert!(!tracker.is_novel(&empty));

        let scene = filter.labels(&[detection("person", 200.0, 0.9), detection("car", 400.0, 0.8)]);
        assert!(tracker.is_novel(&scene));
        tracker.mark_known(scene);

        let subset = filter.labels(&[detection("car", 400.0, 0.8)]);
        assert!(!tracker.is_novel(&subset));

        // Once the scene is replaced, the person is new again
        tracker.mark_known(subset);
        let again = filter.labels(&[detection("person", 200.0, 0.9)]);
        assert!(tracker.is_novel(&again));
    }

    #[test]
    fn test_project_then_locate() {
        let camera = CameraModel::new(1920, 1080, 50.0);
        let bbox = camera.project(10.0, 8.0, 1.6).unwrap();
        let (bearing, range) = camera.locate(&bbox, 1.6);

        assert_abs_diff_eq!(bearing, 10.0, epsilon = 1e-3);
        assert_abs_diff_eq!(range, 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_project_outside_fov() {
        let camera = CameraModel::new(1920, 1080, 50.0);
        assert!(camera.project(30.0, 5.0, 1.6).is_none());
        assert!(camera.project(-26.0, 5.0, 1.6).is_none());
        assert!(camera.project(0.0, 0.0, 1.6).is_none());
    }

    #[test]
    fn test_arrival_box_height_distance() {
        // A 1.6m person fills 500px at roughly 6.6m with a 50° lens
        let camera = CameraModel::new(1920, 1080, 50.0);
        let bbox = camera.project(0.0, 6.0, 1.6).unwrap();
        assert!(bbox.height() > 500.0);
        let bbox = camera.project(0.0, 7.0, 1.6).unwrap();
        assert!(bbox.height() < 500.0);
    }
}
