//! No-fly zone geometry: flat Euclidean distance from a fixed center.

use ndz_common::Coordinate;

pub const DEFAULT_CENTER: Coordinate = Coordinate {
    x: 250_000.0,
    y: 250_000.0,
};
pub const DEFAULT_RADIUS_KM: f64 = 100.0;

/// Circular exclusion area around `center`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoFlyZone {
    pub center: Coordinate,
    pub radius_km: f64,
}

impl NoFlyZone {
    pub fn new(center: Coordinate, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    /// Distance from the center in kilometers. Feed units are meters.
    pub fn distance_km(&self, position: Coordinate) -> f64 {
        (position.x - self.center.x).hypot(position.y - self.center.y) / 1000.0
    }

    /// The zone boundary itself counts as inside.
    pub fn is_violation(&self, distance_km: f64) -> bool {
        distance_km <= self.radius_km
    }
}

impl Default for NoFlyZone {
    fn default() -> Self {
        Self::new(DEFAULT_CENTER, DEFAULT_RADIUS_KM)
    }
}
