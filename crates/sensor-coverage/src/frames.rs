//! Rotation chain from the sensor frame to the spacecraft-access and
//! body-fixed frames.
//!
//! All matrices are passive: `M_a_to_b * v_a = v_b`.

use crate::spherical::{self, MIN_VECTOR_NORM};
use crate::{CoverageError, Result, RotationMatrix, StateVector};
use nalgebra::Vector3;
use orbital_mechanics::transforms::{rot_x, rot_y, rot_z};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Euler angles (radians) applied about body axes in `sequence` order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Orientation {
    pub angles: [f64; 3],
    pub sequence: [u8; 3],
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            angles: [0.0; 3],
            sequence: [1, 2, 3],
        }
    }
}

impl Orientation {
    pub fn new(angles: [f64; 3], sequence: [u8; 3]) -> Self {
        Self { angles, sequence }
    }

    pub fn from_degrees(angles_deg: [f64; 3], sequence: [u8; 3]) -> Self {
        Self::new(angles_deg.map(f64::to_radians), sequence)
    }

    /// 180° about the third axis of a 1-2-3 sequence.
    pub fn yaw_180() -> Self {
        Self::from_degrees([0.0, 0.0, 180.0], [1, 2, 3])
    }

    /// Direction cosine matrix `R_s3(a3) * R_s2(a2) * R_s1(a1)`.
    pub fn to_matrix(&self) -> Result<RotationMatrix> {
        let [s1, s2, s3] = self.sequence;
        if s1 == s2 || s2 == s3 {
            return Err(CoverageError::InvalidInput(format!(
                "Euler sequence {:?} repeats an axis on consecutive rotations",
                self.sequence
            )));
        }
        let mut m = RotationMatrix::identity();
        for (&axis, &angle) in self.sequence.iter().zip(self.angles.iter()) {
            let r = match axis {
                1 => rot_x(angle),
                2 => rot_y(angle),
                3 => rot_z(angle),
                other => {
                    return Err(CoverageError::InvalidInput(format!(
                        "Euler axis must be 1, 2 or 3, got {}",
                        other
                    )))
                }
            };
            m = r * m;
        }
        Ok(m)
    }
}

/// `|M·Mᵀ - I|`, plus a penalty when the determinant is not +1.
pub fn orthonormality_error(m: &RotationMatrix) -> f64 {
    let residual = (m * m.transpose() - RotationMatrix::identity()).norm();
    residual + (m.determinant() - 1.0).abs()
}

pub fn is_orthonormal(m: &RotationMatrix, tolerance: f64) -> bool {
    orthonormality_error(m) <= tolerance
}

/// Reject matrices that are not proper rotations.
pub fn ensure_orthonormal(m: &RotationMatrix, tolerance: f64, name: &str) -> Result<()> {
    let err = orthonormality_error(m);
    if err.is_finite() && err <= tolerance {
        Ok(())
    } else {
        Err(CoverageError::InvalidInput(format!(
            "{} is not orthonormal (error {:.3e})",
            name, err
        )))
    }
}

/// Compose sensor→body→nadir→access.
pub fn sensor_to_access_rotation(
    body_to_sensor: &RotationMatrix,
    nadir_to_body: &RotationMatrix,
    nadir_to_access: &RotationMatrix,
) -> RotationMatrix {
    nadir_to_access * nadir_to_body.transpose() * body_to_sensor.transpose()
}

/// Compose sensor→body→nadir→body-fixed.
pub fn sensor_to_fixed_rotation(
    body_to_sensor: &RotationMatrix,
    nadir_to_body: &RotationMatrix,
    fixed_to_nadir: &RotationMatrix,
) -> RotationMatrix {
    fixed_to_nadir.transpose() * nadir_to_body.transpose() * body_to_sensor.transpose()
}

/// Body-fixed to local north-east-down at a geocentric latitude/longitude.
pub fn fixed_to_topocentric(latitude: f64, longitude: f64) -> RotationMatrix {
    let (sin_lat, cos_lat) = latitude.sin_cos();
    let (sin_lon, cos_lon) = longitude.sin_cos();
    RotationMatrix::new(
        -sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat,
        -sin_lon, cos_lon, 0.0,
        -cos_lat * cos_lon, -cos_lat * sin_lon, -sin_lat,
    )
}

/// Horizontal unit direction of travel in north-east-down components.
///
/// Falls back to north when the velocity has no horizontal component.
pub fn horizontal_heading(state_fixed: &StateVector, radius: f64) -> Result<Vector3<f64>> {
    let sph = spherical::to_spherical(&state_fixed.position, radius)?;
    let v_ned = fixed_to_topocentric(sph.latitude, sph.longitude) * state_fixed.velocity;
    let horizontal = Vector3::new(v_ned.x, v_ned.y, 0.0);
    let scale = state_fixed.velocity.norm().max(1.0);
    if horizontal.norm() <= MIN_VECTOR_NORM * scale {
        warn!(
            speed = state_fixed.velocity.norm(),
            "velocity has no horizontal component, access frame falls back to north"
        );
        return Ok(Vector3::x());
    }
    Ok(horizontal.normalize())
}

/// Nadir-to-access rotation built from a body-fixed state.
///
/// The access frame is local north-east-down. The nadir frame has `+z`
/// along local vertical (down), `+y` along the horizontal velocity and
/// `+x = y × z`; the returned matrix has those axes as its columns.
pub fn access_frame_from_state(state_fixed: &StateVector, radius: f64) -> Result<RotationMatrix> {
    let along = horizontal_heading(state_fixed, radius)?;
    let z_hat = Vector3::z();
    let x_hat = along.cross(&z_hat);
    Ok(RotationMatrix::from_columns(&[x_hat, along, z_hat]))
}
