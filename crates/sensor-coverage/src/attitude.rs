//! Spacecraft attitude relative to the local nadir frame.

use crate::frames::Orientation;
use crate::spherical::{self, MIN_VECTOR_NORM};
use crate::{CoverageError, Result, RotationMatrix, StateVector};
use nalgebra::Vector3;

pub trait Attitude {
    /// Passive rotation from the nadir frame to the spacecraft body frame.
    fn nadir_to_body(&self) -> RotationMatrix;

    /// Passive rotation from the body-fixed frame to the nadir frame at
    /// this state.
    fn fixed_to_nadir(&self, state_fixed: &StateVector) -> Result<RotationMatrix>;
}

/// Nadir-pointing attitude with an optional fixed body offset.
///
/// Nadir frame: `+z` towards the body centre, `+y` along the horizontal
/// velocity, `+x = y × z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NadirPointing {
    nadir_to_body: RotationMatrix,
}

impl Default for NadirPointing {
    fn default() -> Self {
        Self::new()
    }
}

impl NadirPointing {
    pub fn new() -> Self {
        Self {
            nadir_to_body: RotationMatrix::identity(),
        }
    }

    pub fn with_offset(orientation: &Orientation) -> Result<Self> {
        Ok(Self {
            nadir_to_body: orientation.to_matrix()?,
        })
    }

    /// The same attitude yawed 180° about nadir.
    pub fn yaw_flipped(&self) -> Result<Self> {
        Ok(Self {
            nadir_to_body: Orientation::yaw_180().to_matrix()? * self.nadir_to_body,
        })
    }
}

impl Attitude for NadirPointing {
    fn nadir_to_body(&self) -> RotationMatrix {
        self.nadir_to_body
    }

    fn fixed_to_nadir(&self, state_fixed: &StateVector) -> Result<RotationMatrix> {
        let r = state_fixed.position;
        let z_hat = -r.try_normalize(MIN_VECTOR_NORM).ok_or_else(|| {
            CoverageError::DegenerateGeometry("spacecraft at the body centre".to_string())
        })?;

        let v = state_fixed.velocity;
        let horizontal = v + z_hat * (-v.dot(&z_hat));
        let scale = v.norm().max(1.0);
        let y_hat = match horizontal.try_normalize(MIN_VECTOR_NORM * scale) {
            Some(h) => h,
            None => {
                // Purely radial motion: use local north, as the access frame does.
                let sph = spherical::to_spherical(&r, 0.0)?;
                let (sin_lat, cos_lat) = sph.latitude.sin_cos();
                let (sin_lon, cos_lon) = sph.longitude.sin_cos();
                Vector3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat)
            }
        };
        let x_hat = y_hat.cross(&z_hat);

        Ok(RotationMatrix::from_rows(&[
            x_hat.transpose(),
            y_hat.transpose(),
            z_hat.transpose(),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::is_orthonormal;
    use chrono::{TimeZone, Utc};
    use orbital_mechanics::Frame;

    fn state(position: Vector3<f64>, velocity: Vector3<f64>) -> StateVector {
        StateVector::new(
            position,
            velocity,
            Frame::BodyFixed,
            Utc.with_ymd_and_hms(2018, 5, 26, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_nadir_frame_axes() {
        let s = state(Vector3::new(7000.0, 0.0, 0.0), Vector3::new(0.0, 7.5, 0.0));
        let m = NadirPointing::new().fixed_to_nadir(&s).unwrap();
        // nadir (-x fixed) is +z, velocity (+y fixed) is +y
        assert!((m * Vector3::new(-1.0, 0.0, 0.0) - Vector3::z()).norm() < 1e-12);
        assert!((m * Vector3::y() - Vector3::y()).norm() < 1e-12);
        assert!(is_orthonormal(&m, 1e-12));
    }

    #[test]
    fn test_radial_velocity_falls_back_to_north() {
        let s = state(Vector3::new(7000.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        let m = NadirPointing::new().fixed_to_nadir(&s).unwrap();
        assert!((m * Vector3::z() - Vector3::y()).norm() < 1e-12);
        assert!(is_orthonormal(&m, 1e-12));
    }

    #[test]
    fn test_centre_is_degenerate() {
        let s = state(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0));
        assert!(matches!(
            NadirPointing::new().fixed_to_nadir(&s),
            Err(CoverageError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_yaw_flip_twice_is_identity() {
        let att = NadirPointing::new().yaw_flipped().unwrap().yaw_flipped().unwrap();
        assert!((att.nadir_to_body() - RotationMatrix::identity()).norm() < 1e-12);
    }
}
