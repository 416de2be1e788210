//! Geodesic utilities.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// WGS-84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    /// Latitude (-90 to 90)
    pub latitude: f64,

    /// Longitude (-180 to 180)
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Haversine distance to another point, in statute miles.
    pub fn distance_miles(&self, other: &Coordinates) -> f64 {
        const EARTH_RADIUS_MILES: f64 = 3958.8;

        let lat1_rad = self.latitude.to_radians();
        let lat2_rad = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lon = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_MILES * c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinates::new(51.5074, -0.1278);
        assert!(p.distance_miles(&p).abs() < 1e-9);
    }

    #[test]
    fn test_london_to_manchester() {
        // Central London to central Manchester is roughly 163 miles.
        let london = Coordinates::new(51.5074, -0.1278);
        let manchester = Coordinates::new(53.4808, -2.2426);
        let d = london.distance_miles(&manchester);
        assert!(d > 155.0 && d < 170.0, "unexpected distance {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = Coordinates::new(51.5, -0.1);
        let b = Coordinates::new(51.6, -0.2);
        assert!((a.distance_miles(&b) - b.distance_miles(&a)).abs() < 1e-9);
    }
}
