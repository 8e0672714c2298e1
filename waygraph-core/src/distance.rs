//! Great-circle distance calculation.

/// Distance between two WGS84 coordinates in meters.
pub trait DistanceCalc {
    fn calc_dist(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64;
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance on a spherical earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceCalc for Haversine {
    fn calc_dist(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        let d_lat = (lat2 - lat1).to_radians();
        let d_lon = (lon2 - lon1).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}
