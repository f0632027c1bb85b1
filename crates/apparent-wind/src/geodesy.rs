//! Spherical-earth geodesy and wind vector conventions.
//!
//! Vectors are (u, v) = (east, north) and always point the way the air or boat
//! is moving. Meteorological directions name where the wind comes from.

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Two positions closer than this (in degrees on both axes) have no bearing.
const COINCIDENT_EPSILON_DEG: f64 = 1e-12;

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();

    let a =
        (d_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Initial great-circle bearing from the first position to the second, in
/// degrees clockwise from north, [0, 360). `None` for coincident positions.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if (lat1 - lat2).abs() < COINCIDENT_EPSILON_DEG && (lon1 - lon2).abs() < COINCIDENT_EPSILON_DEG
    {
        return None;
    }
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    Some(normalize_360(y.atan2(x).to_degrees()))
}

/// Maps any angle into [0, 360).
pub fn normalize_360(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Maps any angle into (-180, 180].
pub fn wrap_180(deg: f64) -> f64 {
    let wrapped = normalize_360(deg + 180.0) - 180.0;
    if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
}

/// Converts speed and meteorological "from" direction to a (u, v) vector.
pub fn met_to_uv(speed: f64, direction_from_deg: f64) -> (f64, f64) {
    let theta = direction_from_deg.to_radians();
    (-speed * theta.sin(), -speed * theta.cos())
}

/// Meteorological "from" direction of a (u, v) vector, [0, 360).
pub fn uv_to_met_direction(u: f64, v: f64) -> f64 {
    normalize_360((-u).atan2(-v).to_degrees())
}

pub fn uv_speed(u: f64, v: f64) -> f64 {
    u.hypot(v)
}

/// Velocity of a body moving at `speed` along `course_deg` (clockwise from north).
pub fn course_to_uv(speed: f64, course_deg: f64) -> (f64, f64) {
    let theta = course_deg.to_radians();
    (speed * theta.sin(), speed * theta.cos())
}
