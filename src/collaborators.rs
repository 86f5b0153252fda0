//! Narrow interfaces to the external collaborators.
//!
//! The core never talks to a flight stack, camera, detection model or
//! language model directly. Handles implementing these traits are built by
//! the caller and injected into the pipeline at startup.

use std::sync::Arc;
use std::time::Instant;

use crate::decision::DecisionContext;
use crate::error::Result;
use crate::geometry::{Position, ScanPoint};

/// Result of a motion command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStatus {
    /// Vehicle reached the commanded position
    Arrived,
    /// Motion budget elapsed before arrival
    TimedOut,
}

/// A captured camera frame with the pose it was taken from.
#[derive(Clone, Debug)]
pub struct Frame {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels (may be empty for synthetic frames)
    pub pixels: Arc<[u8]>,
    pub position: Position,
    /// Camera heading at capture (degrees)
    pub heading: f32,
    pub captured_at: Instant,
}

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) / 2.0
    }
}

/// One labelled detection.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Vehicle telemetry and motion.
///
/// `move_to` blocks until arrival or until the implementation's motion
/// budget runs out. Connection, arming, takeoff and landing are the caller's.
pub trait DroneControl: Send {
    fn move_to(&mut self, target: Position, speed: f32) -> Result<MoveStatus>;

    /// Hold the current position (zero velocity).
    fn hover(&mut self) -> Result<()>;

    /// Yaw in place to `heading` (degrees).
    fn turn_to(&mut self, heading: f32) -> Result<()>;

    fn current_position(&self) -> Result<Position>;

    /// Heading in degrees, [0, 360).
    fn current_heading(&self) -> Result<f32>;

    fn capture_frame(&mut self) -> Result<Frame>;

    /// Range returns in the vehicle-centred, world-aligned frame.
    fn range_scan(&mut self) -> Result<Vec<ScanPoint>>;
}

/// Frame source for the producer thread.
pub trait Camera: Send {
    fn capture_frame(&mut self) -> Result<Frame>;
}

/// Object detector shared by the perception thread and action handlers.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// External decision process. Returns free text which the core parses strictly.
pub trait DecisionMaker: Send {
    fn decide(&mut self, context: &DecisionContext, frame: &Frame) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_metrics() {
        let b = BoundingBox::new(100.0, 50.0, 300.0, 250.0);
        assert_eq!(b.height(), 200.0);
        assert_eq!(b.center_x(), 200.0);
    }
}
