//! Directional occupancy histogram built from a range scan.
//!
//! Each accepted return marks its own 5° sector plus 18 sectors on either
//! side, so a single obstacle blocks a ±90° arc and the vehicle keeps lateral
//! clearance while passing it.

use crate::geometry::{SECTOR_COUNT, ScanPoint, sector_index};

/// Sectors inflated on each side of a detected return.
pub const INFLATION_SECTORS: usize = 18;

/// Filters applied to scan points before they count as obstacles.
#[derive(Clone, Debug)]
pub struct ObstacleFilter {
    /// Planar range below which a return is an obstacle (meters)
    pub detection_radius: f32,
    /// Reference height offset of the vertical band (meters, down positive)
    pub band_center: f32,
    /// Half-width of the vertical band (meters)
    pub band_half_width: f32,
}

impl Default for ObstacleFilter {
    fn default() -> Self {
        Self {
            detection_radius: 1.5,
            band_center: 0.5,
            band_half_width: 0.5,
        }
    }
}

impl ObstacleFilter {
    /// Whether a return lies inside the detection radius and vertical band.
    pub fn accepts(&self, point: &ScanPoint) -> bool {
        point.planar_range() < self.detection_radius
            && (point.down - self.band_center).abs() < self.band_half_width
    }
}

/// 72-sector obstruction counters around the vehicle. Zero means clear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyMap {
    counts: [u32; SECTOR_COUNT],
}

impl Default for OccupancyMap {
    fn default() -> Self {
        Self::clear()
    }
}

impl OccupancyMap {
    /// Map with every sector clear.
    pub fn clear() -> Self {
        Self {
            counts: [0; SECTOR_COUNT],
        }
    }

    pub fn from_counts(counts: [u32; SECTOR_COUNT]) -> Self {
        Self { counts }
    }

    /// Build the map from one scan. Pure function of its inputs.
    pub fn from_scan(points: &[ScanPoint], filter: &ObstacleFilter) -> Self {
        let mut map = Self::clear();
        for point in points.iter().filter(|p| filter.accepts(p)) {
            map.mark(sector_index(point.bearing()));
        }
        map
    }

    /// Mark one obstacle sector and inflate it by [`INFLATION_SECTORS`] each way.
    pub fn mark(&mut self, sector: usize) {
        let sector = sector % SECTOR_COUNT;
        self.counts[sector] += 1;

        let mut cw = sector;
        let mut ccw = sector;
        for _ in 0..INFLATION_SECTORS {
            cw = (cw + 1) % SECTOR_COUNT;
            ccw = (ccw + SECTOR_COUNT - 1) % SECTOR_COUNT;
            self.counts[cw] += 1;
            self.counts[ccw] += 1;
        }
    }

    pub fn count(&self, sector: usize) -> u32 {
        self.counts[sector % SECTOR_COUNT]
    }

    pub fn is_clear(&self, sector: usize) -> bool {
        self.count(sector) == 0
    }

    pub fn counts(&self) -> &[u32; SECTOR_COUNT] {
        &self.counts
    }

    /// Number of sectors currently believed clear.
    pub fn clear_sectors(&self) -> usize {
        self.counts.iter().filter(|&&c| c == 0).count()
    }

    pub fn is_fully_obstructed(&self) -> bool {
        self.counts.iter().all(|&c| c > 0)
    }
}
