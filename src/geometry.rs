//! Bearing and position arithmetic in the local NED frame.
//!
//! Bearings are degrees in [0, 360), measured from north toward east, so an
//! increasing bearing turns clockwise when viewed from above.

use serde::{Deserialize, Serialize};

/// Number of occupancy sectors around the vehicle.
pub const SECTOR_COUNT: usize = 72;

/// Angular width of one occupancy sector (degrees).
pub const SECTOR_WIDTH_DEG: f32 = 360.0 / SECTOR_COUNT as f32;

/// Position in the fixed local frame (meters, down positive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub north: f32,
    pub east: f32,
    pub down: f32,
}

impl Position {
    pub const ZERO: Position = Position {
        north: 0.0,
        east: 0.0,
        down: 0.0,
    };

    pub fn new(north: f32, east: f32, down: f32) -> Self {
        Self { north, east, down }
    }

    /// Horizontal distance, ignoring altitude.
    pub fn planar_distance(&self, other: &Position) -> f32 {
        (other.north - self.north).hypot(other.east - self.east)
    }

    /// Full 3D distance.
    pub fn distance(&self, other: &Position) -> f32 {
        let dd = other.down - self.down;
        (self.planar_distance(other).powi(2) + dd * dd).sqrt()
    }

    /// Bearing of the straight line from `self` to `other`.
    pub fn bearing_to(&self, other: &Position) -> f32 {
        bearing_of(other.north - self.north, other.east - self.east)
    }

    /// Same horizontal position at a different altitude.
    pub fn with_down(self, down: f32) -> Self {
        Self { down, ..self }
    }
}

impl From<[f32; 3]> for Position {
    fn from(v: [f32; 3]) -> Self {
        Position::new(v[0], v[1], v[2])
    }
}

/// A range-sensor return in the vehicle-centred frame.
///
/// Axes are aligned with the world NED axes; `down` is measured from the sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScanPoint {
    pub north: f32,
    pub east: f32,
    pub down: f32,
}

impl ScanPoint {
    pub fn new(north: f32, east: f32, down: f32) -> Self {
        Self { north, east, down }
    }

    /// Horizontal range from the sensor.
    pub fn planar_range(&self) -> f32 {
        self.north.hypot(self.east)
    }

    pub fn bearing(&self) -> f32 {
        bearing_of(self.north, self.east)
    }
}

/// Bearing of a horizontal displacement.
pub fn bearing_of(d_north: f32, d_east: f32) -> f32 {
    normalize_bearing(d_east.atan2(d_north).to_degrees())
}

/// Wrap any angle in degrees into [0, 360).
pub fn normalize_bearing(deg: f32) -> f32 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round tiny negatives up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed difference `to - from` wrapped into [-180, 180).
pub fn bearing_difference(from: f32, to: f32) -> f32 {
    normalize_bearing(to - from + 180.0) - 180.0
}

/// Sector index of a bearing: `floor(bearing / 5) mod 72`.
pub fn sector_index(bearing: f32) -> usize {
    (normalize_bearing(bearing) / SECTOR_WIDTH_DEG).floor() as usize % SECTOR_COUNT
}

/// Nominal bearing of a sector (its lower edge, `5 * index`).
pub fn sector_bearing(index: usize) -> f32 {
    (index % SECTOR_COUNT) as f32 * SECTOR_WIDTH_DEG
}

/// Point `distance` away from `origin` along `bearing`, at the same altitude.
pub fn offset_position(origin: Position, bearing: f32, distance: f32) -> Position {
    let rad = bearing.to_radians();
    Position::new(
        origin.north + distance * rad.cos(),
        origin.east + distance * rad.sin(),
        origin.down,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bearing_cardinal_directions() {
        assert_abs_diff_eq!(bearing_of(1.0, 0.0), 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bearing_of(0.0, 1.0), 90.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bearing_of(-1.0, 0.0), 180.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bearing_of(0.0, -1.0), 270.0, epsilon = 1e-4);
    }

    #[test]
    fn test_normalize_bearing_wraps() {
        assert_abs_diff_eq!(normalize_bearing(-90.0), 270.0);
        assert_abs_diff_eq!(normalize_bearing(720.0), 0.0);
        assert!(normalize_bearing(-1e-9) < 360.0);
    }

    #[test]
    fn test_sector_index_range() {
        assert_eq!(sector_index(0.0), 0);
        assert_eq!(sector_index(4.99), 0);
        assert_eq!(sector_index(5.0), 1);
        assert_eq!(sector_index(50.0), 10);
        assert_eq!(sector_index(359.9), 71);
        assert_eq!(sector_index(-0.1), 71);
        assert_eq!(sector_index(360.0), 0);
    }

    #[test]
    fn test_sector_bearing() {
        assert_abs_diff_eq!(sector_bearing(10), 50.0);
        assert_abs_diff_eq!(sector_bearing(72), 0.0);
    }

    #[test]
    fn test_bearing_difference() {
        assert_abs_diff_eq!(bearing_difference(350.0, 10.0), 20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bearing_difference(10.0, 350.0), -20.0, epsilon = 1e-4);
        assert_abs_diff_eq!(bearing_difference(0.0, 90.0), 90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_offset_position_keeps_altitude() {
        let origin = Position::new(1.0, 2.0, -5.0);
        let p = offset_position(origin, 90.0, 2.0);
        assert_abs_diff_eq!(p.north, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(p.east, 4.0, epsilon = 1e-5);
        assert_eq!(p.down, -5.0);
    }

    #[test]
    fn test_distances() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 12.0);
        assert_abs_diff_eq!(a.planar_distance(&b), 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(a.distance(&b), 13.0, epsilon = 1e-5);
    }
}
