//! Per-tick coverage evaluation.
//!
//! A [`CoverageChecker`] borrows its collaborators and holds no state between
//! calls. Each operation takes the spacecraft state for the tick, builds the
//! frame chain once, and then maps headings or grid points through it.

use crate::attitude::Attitude;
use crate::frames::{self, ensure_orthonormal};
use crate::grid::PointGrid;
use crate::projection::ConeIntersectionSolver;
use crate::sensor::SensorModel;
use crate::spherical::{self, MIN_VECTOR_NORM};
use crate::{
    CentralBody, CoverageConfig, CoverageError, ProjectedPoint, Result, RotationMatrix,
    SphericalPosition, StateVector, VisibleSet,
};
use nalgebra::Vector3;
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Frame chain and sub-satellite point for one tick.
#[derive(Debug, Clone, Copy)]
struct TickGeometry {
    state_fixed: StateVector,
    ssp: SphericalPosition,
    body_to_sensor: RotationMatrix,
    nadir_to_body: RotationMatrix,
    fixed_to_nadir: RotationMatrix,
}

impl TickGeometry {
    fn fixed_to_sensor(&self) -> RotationMatrix {
        self.body_to_sensor * self.nadir_to_body * self.fixed_to_nadir
    }
}

pub struct CoverageChecker<'a, S: SensorModel + ?Sized, A: Attitude + ?Sized> {
    body: &'a CentralBody,
    sensor: &'a S,
    attitude: &'a A,
    config: CoverageConfig,
}

impl<'a, S: SensorModel + ?Sized, A: Attitude + ?Sized> CoverageChecker<'a, S, A> {
    pub fn new(body: &'a CentralBody, sensor: &'a S, attitude: &'a A) -> Self {
        Self::with_config(body, sensor, attitude, CoverageConfig::default())
    }

    pub fn with_config(
        body: &'a CentralBody,
        sensor: &'a S,
        attitude: &'a A,
        config: CoverageConfig,
    ) -> Self {
        Self {
            body,
            sensor,
            attitude,
            config,
        }
    }

    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    pub fn body(&self) -> &CentralBody {
        self.body
    }

    fn solver(&self) -> ConeIntersectionSolver {
        ConeIntersectionSolver::new(self.body.radius())
            .with_horizon_tolerance(self.config.horizon_tolerance)
    }

    /// State expressed in the central body's rotating frame.
    pub fn earth_fixed_state(&self, state: &StateVector) -> StateVector {
        self.body.to_body_fixed(state)
    }

    fn geometry(&self, state: &StateVector) -> Result<TickGeometry> {
        let state_fixed = self.earth_fixed_state(state);
        if !state_fixed.to_array().iter().all(|x| x.is_finite()) {
            return Err(CoverageError::InvalidInput(
                "spacecraft state has non-finite components".to_string(),
            ));
        }
        let ssp = spherical::to_spherical(&state_fixed.position, self.body.radius())?;
        if ssp.height <= 0.0 {
            return Err(CoverageError::DegenerateGeometry(format!(
                "spacecraft is {:.3} km below the reference sphere",
                -ssp.height
            )));
        }

        let tol = self.config.orthonormal_tolerance;
        let body_to_sensor = self.sensor.body_to_sensor();
        let nadir_to_body = self.attitude.nadir_to_body();
        let fixed_to_nadir = self.attitude.fixed_to_nadir(&state_fixed)?;
        ensure_orthonormal(&body_to_sensor, tol, "body-to-sensor rotation")?;
        ensure_orthonormal(&nadir_to_body, tol, "nadir-to-body rotation")?;
        ensure_orthonormal(&fixed_to_nadir, tol, "fixed-to-nadir rotation")?;

        trace!(
            lat = ssp.latitude.to_degrees(),
            lon = ssp.longitude.to_degrees(),
            height = ssp.height,
            "sub-satellite point"
        );
        Ok(TickGeometry {
            state_fixed,
            ssp,
            body_to_sensor,
            nadir_to_body,
            fixed_to_nadir,
        })
    }

    /// Project sensor-frame headings onto the reference sphere.
    ///
    /// The output has one element per heading, in input order. Headings
    /// beyond the limb come back as [`ProjectedPoint::NoIntersection`].
    pub fn project_headings(
        &self,
        headings: &[Vector3<f64>],
        state: &StateVector,
    ) -> Result<Vec<ProjectedPoint>> {
        let geom = self.geometry(state)?;
        let nadir_to_access = frames::access_frame_from_state(&geom.state_fixed, self.body.radius())?;
        ensure_orthonormal(
            &nadir_to_access,
            self.config.orthonormal_tolerance,
            "nadir-to-access rotation",
        )?;
        let sensor_to_access = frames::sensor_to_access_rotation(
            &geom.body_to_sensor,
            &geom.nadir_to_body,
            &nadir_to_access,
        );
        let solver = self.solver();

        let projected = headings
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let unit = normalized_heading(h).ok_or_else(|| {
                    CoverageError::InvalidInput(format!("heading {} is zero or non-finite", i))
                })?;
                let pair = spherical::to_clock_cone(&(sensor_to_access * unit))?;
                solver.solve(pair, &geom.ssp)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            headings = projected.len(),
            misses = projected.iter().filter(|p| !p.is_ground()).count(),
            "projected headings"
        );
        Ok(projected)
    }

    /// Project the sensor boundary.
    pub fn check_intersection(&self, state: &StateVector) -> Result<Vec<ProjectedPoint>> {
        self.project_headings(&self.sensor.headings(), state)
    }

    pub fn check_corner_intersection(&self, state: &StateVector) -> Result<Vec<ProjectedPoint>> {
        self.project_headings(&self.sensor.corner_headings(), state)
    }

    pub fn check_boresight(&self, state: &StateVector) -> Result<ProjectedPoint> {
        let projected = self.project_headings(&[self.sensor.boresight()], state)?;
        Ok(projected
            .into_iter()
            .next()
            .unwrap_or(ProjectedPoint::NoIntersection))
    }

    /// Sensor pole directions expressed as unit vectors in the body-fixed frame.
    pub fn check_pole_intersection(&self, state: &StateVector) -> Result<Vec<Vector3<f64>>> {
        let geom = self.geometry(state)?;
        let sensor_to_fixed = frames::sensor_to_fixed_rotation(
            &geom.body_to_sensor,
            &geom.nadir_to_body,
            &geom.fixed_to_nadir,
        );

        self.sensor
            .pole_headings()
            .iter()
            .enumerate()
            .map(|(i, pole)| {
                let unit = normalized_heading(pole).ok_or_else(|| {
                    CoverageError::InvalidInput(format!("pole heading {} is zero or non-finite", i))
                })?;
                // Re-normalize away drift accumulated through the chain.
                (sensor_to_fixed * unit)
                    .try_normalize(MIN_VECTOR_NORM)
                    .ok_or_else(|| {
                        CoverageError::DegenerateGeometry(format!(
                            "pole heading {} collapsed under rotation",
                            i
                        ))
                    })
            })
            .collect()
    }

    /// Indices of grid points inside the field of view at this state.
    ///
    /// Each point passes a horizon test on the reference sphere, then its
    /// line of sight is rotated into the sensor frame and handed to
    /// [`SensorModel::check_target_visibility`].
    pub fn check_grid_visibility<G>(&self, grid: &G, state: &StateVector) -> Result<VisibleSet>
    where
        G: PointGrid + Sync + ?Sized,
        S: Sync,
    {
        let geom = self.geometry(state)?;
        let fixed_to_sensor = geom.fixed_to_sensor();
        let spacecraft = geom.state_fixed.position;
        let radius = self.body.radius();
        let sensor = self.sensor;

        let visible = |index: usize| -> bool {
            let Some(point) = grid.position(index, radius) else {
                return false;
            };
            let line_of_sight = spacecraft - point;
            // Spacecraft must be above the point's local horizon.
            if point.dot(&line_of_sight) <= 0.0 {
                return false;
            }
            match spherical::to_clock_cone(&(fixed_to_sensor * (-line_of_sight))) {
                Ok(pair) => sensor.check_target_visibility(pair),
                Err(_) => false,
            }
        };

        let n = grid.num_points();
        #[cfg(feature = "parallel")]
        let set: VisibleSet = (0..n).into_par_iter().filter(|&i| visible(i)).collect();
        #[cfg(not(feature = "parallel"))]
        let set: VisibleSet = (0..n).filter(|&i| visible(i)).collect();

        debug!(points = n, visible = set.len(), "grid visibility");
        Ok(set)
    }
}

fn normalized_heading(h: &Vector3<f64>) -> Option<Vector3<f64>> {
    if h.iter().all(|x| x.is_finite()) {
        h.try_normalize(MIN_VECTOR_NORM)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attitude::NadirPointing;
    use crate::grid::PointGroup;
    use crate::sensor::ConicalSensor;
    use crate::{AnglePair, Frame};
    use chrono::{TimeZone, Utc};
    use std::f64::consts::FRAC_PI_2;

    fn fixed_state(position: Vector3<f64>, velocity: Vector3<f64>) -> StateVector {
        StateVector::new(
            position,
            velocity,
            Frame::BodyFixed,
            Utc.with_ymd_and_hms(2018, 5, 26, 12, 0, 0).unwrap(),
        )
    }

    fn over_origin(earth: &CentralBody) -> StateVector {
        fixed_state(
            Vector3::new(earth.radius() + 700.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 7.5),
        )
    }

    struct SkewedSensor;

    impl SensorModel for SkewedSensor {
        fn headings(&self) -> Vec<Vector3<f64>> {
            vec![Vector3::z()]
        }
        fn corner_headings(&self) -> Vec<Vector3<f64>> {
            Vec::new()
        }
        fn pole_headings(&self) -> Vec<Vector3<f64>> {
            Vec::new()
        }
        fn body_to_sensor(&self) -> RotationMatrix {
            RotationMatrix::identity() * 1.1
        }
        fn check_target_visibility(&self, _: AnglePair) -> bool {
            true
        }
    }

    #[test]
    fn test_boresight_hits_sub_satellite_point() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);
        let p = checker.check_boresight(&over_origin(&earth)).unwrap().ground().unwrap();
        assert!(p.latitude.abs() < 1e-12);
        assert!(p.longitude.abs() < 1e-12);
    }

    #[test]
    fn test_projection_preserves_order_and_marks_misses() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);
        let far = 80f64.to_radians();
        let headings = [
            Vector3::new(far.sin(), 0.0, far.cos()),
            Vector3::z(),
            Vector3::new(0.0, 0.1f64.sin(), 0.1f64.cos()),
        ];
        let out = checker.project_headings(&headings, &over_origin(&earth)).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], ProjectedPoint::NoIntersection);
        assert!(out[1].is_ground());
        // sensor +y is along track, northbound here
        assert!(out[2].ground().unwrap().latitude > 0.0);
    }

    #[test]
    fn test_zero_heading_is_invalid() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);
        assert!(matches!(
            checker.project_headings(&[Vector3::zeros()], &over_origin(&earth)),
            Err(CoverageError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_spacecraft_below_surface_is_degenerate() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);
        let inside = fixed_state(Vector3::new(1000.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        assert!(matches!(
            checker.check_boresight(&inside),
            Err(CoverageError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_non_orthonormal_sensor_rejected() {
        let earth = CentralBody::earth();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &SkewedSensor, &attitude);
        assert!(matches!(
            checker.check_intersection(&over_origin(&earth)),
            Err(CoverageError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_grid_visibility_near_nadir() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(10f64.to_radians()).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);

        let mut grid = PointGroup::new();
        grid.add_user_defined_points(
            &[0.0, 0.5f64.to_radians(), 0.0, 5f64.to_radians(), 0.0],
            &[0.0, 0.0, 3.0, 0.0, FRAC_PI_2],
        )
        .unwrap();
        let visible = checker.check_grid_visibility(&grid, &over_origin(&earth)).unwrap();
        assert_eq!(visible.into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_pole_of_conical_sensor_is_nadir() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);

        let inertial = StateVector::new(
            Vector3::new(4000.0, 5000.0, 1500.0),
            Vector3::new(-5.0, 4.0, 2.0),
            Frame::Inertial,
            Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap(),
        );
        let poles = checker.check_pole_intersection(&inertial).unwrap();
        assert_eq!(poles.len(), 1);
        let expected = -earth.to_body_fixed(&inertial).position.normalize();
        assert!((poles[0] - expected).norm() < 1e-9);
        assert!((poles[0].norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pole_stays_in_body_fixed_axes() {
        let earth = CentralBody::earth();
        let sensor = ConicalSensor::new(0.2).unwrap();
        let attitude = NadirPointing::new();
        let checker = CoverageChecker::new(&earth, &sensor, &attitude);

        // The epoch must not rotate the answer: the input is already fixed.
        let fixed = StateVector::new(
            Vector3::new(7000.0, 0.0, 0.0),
            Vector3::new(0.0, 7.5, 0.0),
            Frame::BodyFixed,
            Utc.with_ymd_and_hms(2020, 1, 1, 6, 0, 0).unwrap(),
        );
        let poles = checker.check_pole_intersection(&fixed).unwrap();
        assert_eq!(poles.len(), 1);
        assert!((poles[0] - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
