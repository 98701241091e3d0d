use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, as used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS-84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points in meters.
///
/// Haversine is accurate to well under a meter at the sub-kilometer ranges
/// the cancellation geofence cares about.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(48.8566, 2.3522);
        assert_eq!(haversine_meters(p, p), 0.0);
    }

    #[test]
    fn test_city_scale_distance() {
        // Paris to Lyon, roughly 392 km great-circle.
        let paris = GeoPoint::new(48.8566, 2.3522);
        let lyon = GeoPoint::new(45.7640, 4.8357);

        let d = haversine_meters(paris, lyon);
        assert!((d - 392_000.0).abs() < 2_000.0, "got {}", d);
    }

    #[test]
    fn test_geofence_scale_distance() {
        // 0.001 degrees of latitude is about 111 m everywhere on the globe.
        let a = GeoPoint::new(41.3275, 19.8187);
        let b = GeoPoint::new(41.3285, 19.8187);

        let d = haversine_meters(a, b);
        assert!((d - 111.0).abs() < 1.0, "got {}", d);
    }
}
