//! Sensor field-of-view models.
//!
//! The coverage checker only reads snapshots from a [`SensorModel`]: unit
//! headings in the sensor frame, the body-to-sensor rotation, and an
//! inclusion test for a target direction.

use crate::frames::Orientation;
use crate::spherical::{from_clock_cone, to_clock_cone};
use crate::{AnglePair, CoverageError, Result, RotationMatrix};
use nalgebra::Vector3;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Default number of boundary headings for a conical sensor.
pub const DEFAULT_BOUNDARY_POINTS: usize = 36;

/// Default number of headings per custom-sensor edge (corner included).
pub const DEFAULT_POINTS_PER_EDGE: usize = 8;

pub trait SensorModel {
    /// Boresight in the sensor frame.
    fn boresight(&self) -> Vector3<f64> {
        Vector3::z()
    }

    /// Ordered unit headings tracing the field-of-view boundary.
    fn headings(&self) -> Vec<Vector3<f64>>;

    /// Corner headings (empty for sensors without corners).
    fn corner_headings(&self) -> Vec<Vector3<f64>>;

    /// Pole directions of the boundary arcs.
    fn pole_headings(&self) -> Vec<Vector3<f64>>;

    fn body_to_sensor(&self) -> RotationMatrix;

    /// Whether a direction, given as clock/cone in the sensor frame, is in view.
    fn check_target_visibility(&self, target: AnglePair) -> bool;
}

/// Circular field of view about the boresight.
#[derive(Debug, Clone, PartialEq)]
pub struct ConicalSensor {
    half_angle: f64,
    boundary_points: usize,
    body_to_sensor: RotationMatrix,
}

impl ConicalSensor {
    pub fn new(half_angle: f64) -> Result<Self> {
        if !(half_angle > 0.0 && half_angle < PI) {
            return Err(CoverageError::InvalidInput(format!(
                "conical half angle must be in (0, π), got {}",
                half_angle
            )));
        }
        Ok(Self {
            half_angle,
            boundary_points: DEFAULT_BOUNDARY_POINTS,
            body_to_sensor: RotationMatrix::identity(),
        })
    }

    pub fn with_orientation(mut self, orientation: &Orientation) -> Result<Self> {
        self.body_to_sensor = orientation.to_matrix()?;
        Ok(self)
    }

    pub fn with_boundary_points(mut self, n: usize) -> Self {
        self.boundary_points = n.max(3);
        self
    }

    pub fn half_angle(&self) -> f64 {
        self.half_angle
    }
}

impl SensorModel for ConicalSensor {
    fn headings(&self) -> Vec<Vector3<f64>> {
        let n = self.boundary_points;
        (0..n)
            .map(|k| from_clock_cone(AnglePair::new(TAU * k as f64 / n as f64, self.half_angle)))
            .collect()
    }

    fn corner_headings(&self) -> Vec<Vector3<f64>> {
        Vec::new()
    }

    fn pole_headings(&self) -> Vec<Vector3<f64>> {
        vec![self.boresight()]
    }

    fn body_to_sensor(&self) -> RotationMatrix {
        self.body_to_sensor
    }

    fn check_target_visibility(&self, target: AnglePair) -> bool {
        target.cone <= self.half_angle
    }
}

/// Polygonal field of view given by corner clock/cone angles.
///
/// Edges are great-circle arcs between consecutive corners. Inclusion is
/// tested on the stereographic projection about the boresight, against the
/// densified boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSensor {
    corners: Vec<Vector3<f64>>,
    points_per_edge: usize,
    body_to_sensor: RotationMatrix,
    max_cone: f64,
    boundary_xy: Vec<(f64, f64)>,
}

impl CustomSensor {
    /// Corners from matching cone and clock arrays (radians).
    pub fn new(cone: &[f64], clock: &[f64]) -> Result<Self> {
        if cone.len() != clock.len() {
            return Err(CoverageError::InvalidInput(format!(
                "{} cone angles but {} clock angles",
                cone.len(),
                clock.len()
            )));
        }
        if cone.len() < 3 {
            return Err(CoverageError::InvalidInput(
                "a custom sensor needs at least three corners".to_string(),
            ));
        }
        if let Some(bad) = cone.iter().find(|c| !(**c >= 0.0 && **c < PI)) {
            return Err(CoverageError::InvalidInput(format!(
                "cone angle {} outside [0, π)",
                bad
            )));
        }
        let corners = cone
            .iter()
            .zip(clock)
            .map(|(&cone, &clock)| from_clock_cone(AnglePair::new(clock, cone)))
            .collect();
        let mut sensor = Self {
            corners,
            points_per_edge: DEFAULT_POINTS_PER_EDGE,
            body_to_sensor: RotationMatrix::identity(),
            max_cone: 0.0,
            boundary_xy: Vec::new(),
        };
        sensor.rebuild()?;
        Ok(sensor)
    }

    /// Rectangle of half angles about the sensor `y` (along-track) and `x`
    /// (cross-track) axes.
    pub fn rectangular(along_track_half: f64, cross_track_half: f64) -> Result<Self> {
        if !(along_track_half > 0.0 && along_track_half < FRAC_PI_2)
            || !(cross_track_half > 0.0 && cross_track_half < FRAC_PI_2)
        {
            return Err(CoverageError::InvalidInput(format!(
                "rectangular half angles must be in (0, π/2), got ({}, {})",
                along_track_half, cross_track_half
            )));
        }
        let (tx, ty) = (cross_track_half.tan(), along_track_half.tan());
        let mut cone = Vec::with_capacity(4);
        let mut clock = Vec::with_capacity(4);
        for (sx, sy) in [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)] {
            let pair = to_clock_cone(&Vector3::new(sx * tx, sy * ty, 1.0))?;
            cone.push(pair.cone);
            clock.push(pair.clock);
        }
        Self::new(&cone, &clock)
    }

    pub fn with_orientation(mut self, orientation: &Orientation) -> Result<Self> {
        self.body_to_sensor = orientation.to_matrix()?;
        Ok(self)
    }

    pub fn with_points_per_edge(mut self, n: usize) -> Result<Self> {
        self.points_per_edge = n.max(1);
        self.rebuild()?;
        Ok(self)
    }

    pub fn max_cone(&self) -> f64 {
        self.max_cone
    }

    fn rebuild(&mut self) -> Result<()> {
        let boundary = self.densify();
        self.max_cone = boundary
            .iter()
            .map(|h| h.z.clamp(-1.0, 1.0).acos())
            .fold(0.0, f64::max);
        self.boundary_xy = boundary
            .iter()
            .map(|h| to_clock_cone(h).map(stereographic))
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    fn densify(&self) -> Vec<Vector3<f64>> {
        let n = self.corners.len();
        let mut out = Vec::with_capacity(n * self.points_per_edge);
        for i in 0..n {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % n];
            for k in 0..self.points_per_edge {
                out.push(slerp(&a, &b, k as f64 / self.points_per_edge as f64));
            }
        }
        out
    }
}

impl SensorModel for CustomSensor {
    fn headings(&self) -> Vec<Vector3<f64>> {
        self.densify()
    }

    fn corner_headings(&self) -> Vec<Vector3<f64>> {
        self.corners.clone()
    }

    fn pole_headings(&self) -> Vec<Vector3<f64>> {
        let n = self.corners.len();
        (0..n)
            .filter_map(|i| {
                let pole = self.corners[i].cross(&self.corners[(i + 1) % n]);
                pole.try_normalize(1e-12)
            })
            .collect()
    }

    fn body_to_sensor(&self) -> RotationMatrix {
        self.body_to_sensor
    }

    fn check_target_visibility(&self, target: AnglePair) -> bool {
        if target.cone > self.max_cone {
            return false;
        }
        point_in_polygon(stereographic(target), &self.boundary_xy)
    }
}

/// Stereographic projection about the boresight.
fn stereographic(pair: AnglePair) -> (f64, f64) {
    let r = (pair.cone / 2.0).tan();
    let (s, c) = pair.clock.sin_cos();
    (r * c, r * s)
}

/// Even-odd ray casting.
fn point_in_polygon(p: (f64, f64), polygon: &[(f64, f64)]) -> bool {
    let (x, y) = p;
    let mut inside = false;
    let mut j = polygon.len().wrapping_sub(1);
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn slerp(a: &Vector3<f64>, b: &Vector3<f64>, t: f64) -> Vector3<f64> {
    let omega = a.dot(b).clamp(-1.0, 1.0).acos();
    if omega < 1e-12 {
        return *a;
    }
    let sin_omega = omega.sin();
    (a * ((1.0 - t) * omega).sin() + b * (t * omega).sin()) / sin_omega
}
