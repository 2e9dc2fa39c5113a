//! Great-circle distance between GPS fixes
//!
//! The distance track accumulates haversine distance between consecutive
//! fixes. Sub-meter accuracy is irrelevant at consumer GPS noise levels,
//! so the spherical mean-radius model is sufficient.

use crate::constants::EARTH_RADIUS_M;
use crate::events::GeoPoint;

/// Haversine distance between two fixes, in meters
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let sin_lat = libm::sin(d_lat / 2.0);
    let sin_lon = libm::sin(d_lon / 2.0);
    let h = sin_lat * sin_lat + libm::cos(lat_a) * libm::cos(lat_b) * sin_lon * sin_lon;

    2.0 * EARTH_RADIUS_M * libm::asin(libm::sqrt(h.min(1.0)))
}
