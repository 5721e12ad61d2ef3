//! Cartesian/spherical conversion and clock/cone angles.

use crate::{AnglePair, CoverageError, LatLon, Result, SphericalPosition};
use nalgebra::Vector3;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Vectors shorter than this carry no direction.
pub const MIN_VECTOR_NORM: f64 = 1e-12;

/// Below this off-axis component the clock angle is undefined and pinned to 0.
const POLE_EPSILON: f64 = 1e-12;

/// Wrap a longitude into `(-π, π]`.
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Wrap a clock angle into `[0, 2π)`.
pub fn wrap_clock(clock: f64) -> f64 {
    let wrapped = clock.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Geocentric latitude, longitude and height above a sphere of `radius`.
///
/// Fails with `DegenerateGeometry` for a zero or non-finite vector.
pub fn to_spherical(cartesian: &Vector3<f64>, radius: f64) -> Result<SphericalPosition> {
    let norm = cartesian.norm();
    if !norm.is_finite() || norm < MIN_VECTOR_NORM {
        return Err(CoverageError::DegenerateGeometry(format!(
            "cannot convert vector of magnitude {} to spherical",
            norm
        )));
    }
    let (x, y, z) = (cartesian.x, cartesian.y, cartesian.z);
    let rho = x.hypot(y);
    let longitude = if rho < POLE_EPSILON * norm {
        0.0
    } else {
        wrap_longitude(y.atan2(x))
    };
    Ok(SphericalPosition {
        latitude: z.atan2(rho),
        longitude,
        height: norm - radius,
    })
}

/// Point at `height` above a sphere of `radius`.
pub fn from_spherical(latitude: f64, longitude: f64, radius: f64, height: f64) -> Vector3<f64> {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_lon, cos_lon) = longitude.sin_cos();
    Vector3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat) * (radius + height)
}

/// Clock/cone angles of a direction in the access frame.
///
/// The access-frame `+z` (nadir) plays the role of the pole, so
/// `cone = π/2 - latitude` and `clock = longitude` of the same decomposition.
/// At cone 0 or π the clock is pinned to 0.
pub fn to_clock_cone(heading: &Vector3<f64>) -> Result<AnglePair> {
    let sph = to_spherical(heading, 1.0)?;
    Ok(AnglePair {
        clock: wrap_clock(sph.longitude),
        cone: FRAC_PI_2 - sph.latitude,
    })
}

/// Unit vector for a clock/cone pair.
pub fn from_clock_cone(pair: AnglePair) -> Vector3<f64> {
    let (sin_cone, cos_cone) = pair.cone.sin_cos();
    let (sin_clock, cos_clock) = pair.clock.sin_cos();
    Vector3::new(sin_cone * cos_clock, sin_cone * sin_clock, cos_cone)
}

/// One angle pair per heading, same order.
pub fn unit_vectors_to_clock_cone(headings: &[Vector3<f64>]) -> Result<Vec<AnglePair>> {
    headings.iter().map(to_clock_cone).collect()
}

/// Great-circle angle between two ground points.
pub fn central_angle(a: LatLon, b: LatLon) -> f64 {
    let dlat = b.latitude - a.latitude;
    let dlon = b.longitude - a.longitude;
    let h = (dlat / 2.0).sin().powi(2)
        + a.latitude.cos() * b.latitude.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_spherical_on_axes() {
        let p = to_spherical(&Vector3::new(7000.0, 0.0, 0.0), 6378.137).unwrap();
        assert_eq!(p.latitude, 0.0);
        assert_eq!(p.longitude, 0.0);
        assert!((p.height - 621.863).abs() < 1e-9);

        let north = to_spherical(&Vector3::new(0.0, 0.0, 2.0), 1.0).unwrap();
        assert!((north.latitude - FRAC_PI_2).abs() < 1e-15);
        assert_eq!(north.longitude, 0.0);
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        assert!(matches!(
            to_spherical(&Vector3::zeros(), 1.0),
            Err(CoverageError::DegenerateGeometry(_))
        ));
        assert!(to_clock_cone(&Vector3::new(f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_longitude_range() {
        let p = to_spherical(&Vector3::new(-1.0, -0.0, 0.0), 1.0).unwrap();
        assert!((p.longitude - PI).abs() < 1e-15);
        assert!((wrap_longitude(-PI) - PI).abs() < 1e-15);
        assert!((wrap_longitude(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_clock_cone_of_nadir_and_zenith() {
        let nadir = to_clock_cone(&Vector3::z()).unwrap();
        assert_eq!(nadir.clock, 0.0);
        assert!(nadir.cone.abs() < 1e-15);

        let zenith = to_clock_cone(&-Vector3::z()).unwrap();
        assert_eq!(zenith.clock, 0.0);
        assert!((zenith.cone - PI).abs() < 1e-15);
    }

    #[test]
    fn test_clock_is_measured_from_x_towards_y() {
        let east = to_clock_cone(&Vector3::y()).unwrap();
        assert!((east.clock - FRAC_PI_2).abs() < 1e-15);
        assert!((east.cone - FRAC_PI_2).abs() < 1e-15);

        let west = to_clock_cone(&-Vector3::y()).unwrap();
        assert!((west.clock - 3.0 * FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn test_clock_cone_round_trip() {
        for &(clock, cone) in &[(0.1, 0.2), (3.0, 1.0), (5.5, 2.9), (PI, FRAC_PI_2)] {
            let pair = to_clock_cone(&from_clock_cone(AnglePair::new(clock, cone))).unwrap();
            assert!((pair.clock - clock).abs() < 1e-12);
            assert!((pair.cone - cone).abs() < 1e-12);
        }
    }

    #[test]
    fn test_batch_conversion_preserves_order() {
        let headings = vec![Vector3::z(), Vector3::x(), Vector3::y()];
        let pairs = unit_vectors_to_clock_cone(&headings).unwrap();
        assert_eq!(pairs.len(), 3);
        assert!(pairs[0].cone.abs() < 1e-15);
        assert!(pairs[1].clock.abs() < 1e-15);
        assert!((pairs[2].clock - FRAC_PI_2).abs() < 1e-15);
    }

    #[test]
    fn test_central_angle() {
        let a = LatLon {
            latitude: 0.0,
            longitude: 0.0,
        };
        let b = LatLon {
            latitude: 0.0,
            longitude: FRAC_PI_2,
        };
        assert!((central_angle(a, b) - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(central_angle(a, a), 0.0);
    }

    #[test]
    fn test_from_spherical_round_trip() {
        let v = from_spherical(0.4, -2.0, 6378.137, 10.0);
        let p = to_spherical(&v, 6378.137).unwrap();
        assert!((p.latitude - 0.4).abs() < 1e-12);
        assert!((p.longitude + 2.0).abs() < 1e-12);
        assert!((p.height - 10.0).abs() < 1e-9);
    }
}
