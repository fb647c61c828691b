//! Geodesic helpers for distance, bearing and position calculations.
//!
//! All public functions take and return degrees/kilometers; radians are used
//! internally only.

use crate::models::Coordinate;
use std::f64::consts::PI;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates in kilometers (haversine).
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    haversine_km(a.lat, a.lon, b.lat, b.lon)
}

/// Haversine distance on raw degrees, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360).
///
/// Identical points have no direction; 0 is returned for them.
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    normalize_degrees(x.atan2(y).to_degrees())
}

/// Linear interpolation in coordinate space.
///
/// Not geodesic: good enough for simulated positions along short legs, but
/// it drifts from the great circle over long segments.
pub fn interpolate(a: Coordinate, b: Coordinate, fraction: f64) -> Coordinate {
    let t = fraction.clamp(0.0, 1.0);
    Coordinate::new(a.lat * (1.0 - t) + b.lat * t, a.lon * (1.0 - t) + b.lon * t)
}

/// Point reached by travelling `distance_km` from `origin` along `bearing_deg`.
pub fn destination_point(origin: Coordinate, distance_km: f64, bearing_deg: f64) -> Coordinate {
    if distance_km.abs() <= f64::EPSILON {
        return origin;
    }

    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let bearing_rad = bearing_deg.to_radians();
    let angular_distance = distance_km / EARTH_RADIUS_KM;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let lon2 = (lon1 + y.atan2(x) + PI).rem_euclid(2.0 * PI) - PI;

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Point at `fraction` of the great circle between `a` and `b`.
pub fn along_great_circle(a: Coordinate, b: Coordinate, fraction: f64) -> Coordinate {
    let total = distance(a, b);
    destination_point(a, total * fraction.clamp(0.0, 1.0), bearing(a, b))
}

/// Sum of consecutive leg distances in kilometers.
pub fn path_length(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|leg| distance(leg[0], leg[1])).sum()
}

pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
