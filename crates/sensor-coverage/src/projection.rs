//! Closed-form earth intersection of a clock/cone heading.
//!
//! Spherical trigonometry after Wertz, "Space Mission Analysis and Design":
//!
//! ```text
//! sin ρ  = R / (R + H)                     angular radius of the body
//! ε      = acos(sin η / sin ρ)             elevation at the target, η = cone
//! λ      = π/2 - η - ε                     earth-central angle SSP -> target
//! lat_P  = π/2 - acos(cos λ sin lat_S + sin λ cos lat_S cos(-clock))
//! ΔL     = acos((cos λ - sin lat_S sin lat_P) / (cos lat_S cos lat_P))
//! lon_P  = lon_S + ΔL  if clock < π,  lon_S - ΔL  otherwise
//! ```
//!
//! ΔL is evaluated as `atan2(|sin clock| sin λ cos lat_S, cos λ - sin lat_S sin lat_P)`,
//! which equals the acos expression on `[0, π]`.

use crate::spherical::{wrap_clock, wrap_longitude};
use crate::{AnglePair, CoverageError, LatLon, ProjectedPoint, Result, SphericalPosition};
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::trace;

/// `cos lat_S · cos lat_P` below this is treated as a pole; ΔL is then 0.
const POLE_DENOMINATOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeIntersectionSolver {
    radius: f64,
    horizon_tolerance: f64,
}

impl ConeIntersectionSolver {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            horizon_tolerance: 1e-12,
        }
    }

    pub fn with_horizon_tolerance(mut self, tol: f64) -> Self {
        self.horizon_tolerance = tol;
        self
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Sine of the angular radius of the body seen from `height`.
    pub fn sin_rho(&self, height: f64) -> Result<f64> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(CoverageError::InvalidInput(format!(
                "reference radius must be positive, got {}",
                self.radius
            )));
        }
        if !(height.is_finite() && height > 0.0) {
            return Err(CoverageError::DegenerateGeometry(format!(
                "spacecraft height {} km is not above the reference sphere",
                height
            )));
        }
        Ok(self.radius / (self.radius + height))
    }

    /// Largest cone angle that still reaches the surface (the limb).
    pub fn horizon_cone(&self, height: f64) -> Result<f64> {
        Ok(self.sin_rho(height)?.asin())
    }

    /// Project one heading from the sub-satellite point `ssp`.
    ///
    /// Any finite clock is accepted and wrapped into `[0, 2π)`; the cone must
    /// lie in `[0, π]`.
    pub fn solve(&self, heading: AnglePair, ssp: &SphericalPosition) -> Result<ProjectedPoint> {
        let AnglePair { clock, cone } = heading;
        if !(clock.is_finite() && cone.is_finite()) {
            return Err(CoverageError::InvalidInput(format!(
                "non-finite heading angles ({}, {})",
                clock, cone
            )));
        }
        if !(0.0..=PI).contains(&cone) {
            return Err(CoverageError::InvalidInput(format!(
                "cone angle {} outside [0, π]",
                cone
            )));
        }
        let clock = wrap_clock(clock);
        let sin_rho = self.sin_rho(ssp.height)?;

        // Past nadir-perpendicular the ray points away from the body.
        if cone > FRAC_PI_2 {
            trace!(cone, "heading above local horizontal");
            return Ok(ProjectedPoint::NoIntersection);
        }
        let ratio = cone.sin() / sin_rho;
        if ratio > 1.0 + self.horizon_tolerance {
            trace!(cone, sin_rho, "heading beyond the limb");
            return Ok(ProjectedPoint::NoIntersection);
        }
        let epsilon = ratio.min(1.0).acos();

        let lambda = FRAC_PI_2 - cone - epsilon;
        let phi_e = -clock;
        let (sin_lat_s, cos_lat_s) = ssp.latitude.sin_cos();

        let cos_lat_p_prime =
            lambda.cos() * sin_lat_s + lambda.sin() * cos_lat_s * phi_e.cos();
        let lat_p = FRAC_PI_2 - cos_lat_p_prime.clamp(-1.0, 1.0).acos();

        let denominator = cos_lat_s * lat_p.cos();
        // Same angle as the acos form, but well conditioned when ΔL is near 0.
        let delta_l = if denominator.abs() < POLE_DENOMINATOR {
            0.0
        } else {
            (phi_e.sin().abs() * lambda.sin() * cos_lat_s)
                .atan2(lambda.cos() - sin_lat_s * lat_p.sin())
        };

        let lon_p = if clock < PI {
            ssp.longitude + delta_l
        } else {
            ssp.longitude - delta_l
        };

        Ok(ProjectedPoint::Ground(LatLon {
            latitude: lat_p,
            longitude: wrap_longitude(lon_p),
        }))
    }
}
