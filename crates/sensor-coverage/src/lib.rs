//! Sensor Coverage Engine
//!
//! Projects the boresight, edge, corner and pole headings of a spacecraft
//! sensor onto a reference sphere, and tests a fixed grid of ground points
//! for visibility, once per propagation step.
//!
//! # Frame chain
//!
//! ```text
//! sensor --BS^T--> body --NB^T--> nadir --SA_N--> spacecraft access (N, E, D)
//!                                   |
//!                                   +--(fixed->nadir)^T--> body-fixed
//! ```
//!
//! Every operation is a pure function of the current spacecraft state and
//! the read-only collaborators borrowed by [`CoverageChecker`]: the
//! [`CentralBody`], a [`SensorModel`], an [`Attitude`] and a [`PointGrid`].
//!
//! Diagnostics go through `tracing`; nothing is emitted unless the host
//! installs a subscriber.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub mod attitude;
pub mod checker;
pub mod frames;
pub mod grid;
pub mod projection;
pub mod sensor;
pub mod spherical;

pub use attitude::{Attitude, NadirPointing};
pub use checker::CoverageChecker;
pub use frames::Orientation;
pub use grid::{GroundPoint, PointGrid, PointGroup};
pub use orbital_mechanics::{CentralBody, Frame, StateVector};
pub use projection::ConeIntersectionSolver;
pub use sensor::{ConicalSensor, CustomSensor, SensorModel};

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Orbital(#[from] orbital_mechanics::OrbitalError),
}

pub type Result<T> = std::result::Result<T, CoverageError>;

/// 3x3 passive basis change between two named frames.
pub type RotationMatrix = Matrix3<f64>;

/// Grid indices visible at one instant. Ordered and free of duplicates.
pub type VisibleSet = BTreeSet<usize>;

/// Latitude in `[-π/2, π/2]`, longitude in `(-π, π]`, height above the
/// reference radius used for the conversion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SphericalPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

/// Direction of one heading in the spacecraft-access frame.
///
/// `clock` in `[0, 2π)` is measured from north towards east; `cone` in
/// `[0, π]` is measured from nadir.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AnglePair {
    pub clock: f64,
    pub cone: f64,
}

impl AnglePair {
    pub fn new(clock: f64, cone: f64) -> Self {
        Self { clock, cone }
    }
}

/// Ground location in radians.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLon {
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of projecting one heading onto the reference sphere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ProjectedPoint {
    Ground(LatLon),
    /// The heading looks past the limb and never meets the surface.
    NoIntersection,
}

impl ProjectedPoint {
    pub fn ground(&self) -> Option<LatLon> {
        match self {
            ProjectedPoint::Ground(p) => Some(*p),
            ProjectedPoint::NoIntersection => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, ProjectedPoint::Ground(_))
    }
}

/// Numerical tolerances for one checker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CoverageConfig {
    /// Slack on `sin(cone) / sin(rho)` above 1 still treated as the horizon.
    pub horizon_tolerance: f64,
    /// Largest `|M·Mᵀ - I|` accepted from collaborator rotation matrices.
    pub orthonormal_tolerance: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            horizon_tolerance: 1e-12,
            orthonormal_tolerance: 1e-6,
        }
    }
}

impl CoverageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn horizon_tolerance(mut self, tol: f64) -> Self {
        self.horizon_tolerance = tol;
        self
    }

    pub fn orthonormal_tolerance(mut self, tol: f64) -> Self {
        self.orthonormal_tolerance = tol;
        self
    }
}
