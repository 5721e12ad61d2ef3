//! Property tests for the projection and visibility geometry.

use chrono::{TimeZone, Utc};
use nalgebra::Vector3;
use proptest::prelude::*;
use sensor_coverage::attitude::{Attitude, NadirPointing};
use sensor_coverage::frames::{self, is_orthonormal, Orientation};
use sensor_coverage::spherical::{central_angle, from_clock_cone, from_spherical, to_clock_cone};
use sensor_coverage::{
    AnglePair, CentralBody, ConeIntersectionSolver, ConicalSensor, CoverageChecker, Frame,
    LatLon, PointGroup, ProjectedPoint, SphericalPosition, StateVector,
};
use std::f64::consts::{PI, TAU};

const RE: f64 = 6378.137;

// ============================================================================
// Generators
// ============================================================================

fn latitude() -> impl Strategy<Value = f64> {
    (-80.0f64..80.0).prop_map(f64::to_radians)
}

fn longitude() -> impl Strategy<Value = f64> {
    (-179.9f64..180.0).prop_map(f64::to_radians)
}

fn altitude_km() -> impl Strategy<Value = f64> {
    200.0f64..36_000.0
}

fn euler_sequence() -> impl Strategy<Value = [u8; 3]> {
    prop_oneof![
        Just([1, 2, 3]),
        Just([3, 2, 1]),
        Just([3, 1, 3]),
        Just([2, 3, 1]),
    ]
}

fn orientation() -> impl Strategy<Value = Orientation> {
    (
        prop::array::uniform3(-180.0f64..180.0),
        euler_sequence(),
    )
        .prop_map(|(angles, seq)| Orientation::from_degrees(angles, seq))
}

fn fixed_state(lat: f64, lon: f64, alt: f64, velocity: Vector3<f64>) -> StateVector {
    StateVector::new(
        from_spherical(lat, lon, RE, alt),
        velocity,
        Frame::BodyFixed,
        Utc.with_ymd_and_hms(2021, 3, 20, 9, 37, 0).unwrap(),
    )
}

fn angle_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    d.min(TAU - d)
}

proptest! {
    #[test]
    fn test_clock_cone_round_trip(clock in 0.0f64..TAU, cone in 0.001f64..(PI - 0.001)) {
        let v = from_clock_cone(AnglePair::new(clock, cone));
        let pair = to_clock_cone(&v).unwrap();
        prop_assert!((pair.cone - cone).abs() < 1e-9);
        prop_assert!(angle_distance(pair.clock, clock) < 1e-9);
        prop_assert!(pair.clock >= 0.0 && pair.clock < TAU);
    }

    #[test]
    fn test_projection_moves_away_with_cone(
        lat in latitude(),
        lon in longitude(),
        alt in altitude_km(),
        clock in 0.0f64..TAU,
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let solver = ConeIntersectionSolver::new(RE);
        let ssp = SphericalPosition { latitude: lat, longitude: lon, height: alt };
        let limb = solver.horizon_cone(alt).unwrap();
        let (near, far) = if a <= b { (a, b) } else { (b, a) };

        let project = |fraction: f64| {
            solver
                .solve(AnglePair::new(clock, fraction * limb * 0.999), &ssp)
                .unwrap()
                .ground()
                .unwrap()
        };
        let origin = LatLon { latitude: lat, longitude: lon };
        let d_near = central_angle(origin, project(near));
        let d_far = central_angle(origin, project(far));
        prop_assert!(d_near <= d_far + 1e-9);

        let beyond = solver.solve(AnglePair::new(clock, limb * 1.0001), &ssp).unwrap();
        prop_assert_eq!(beyond, ProjectedPoint::NoIntersection);
    }

    #[test]
    fn test_projected_points_are_finite_and_wrapped(
        lat in (-90.0f64..=90.0).prop_map(f64::to_radians),
        lon in longitude(),
        alt in altitude_km(),
        clock in 0.0f64..TAU,
        cone in 0.0f64..PI,
    ) {
        let solver = ConeIntersectionSolver::new(RE);
        let ssp = SphericalPosition { latitude: lat, longitude: lon, height: alt };
        if let ProjectedPoint::Ground(p) = solver.solve(AnglePair::new(clock, cone), &ssp).unwrap() {
            prop_assert!(p.latitude.is_finite() && p.longitude.is_finite());
            prop_assert!(p.latitude.abs() <= PI / 2.0 + 1e-12);
            prop_assert!(p.longitude > -PI && p.longitude <= PI);
        }
    }

    #[test]
    fn test_composed_rotations_stay_orthonormal(
        lat in latitude(),
        lon in longitude(),
        alt in altitude_km(),
        vel in prop::array::uniform3(-8.0f64..8.0),
        mounting in orientation(),
        offset in orientation(),
        jd in 2_451_545.0f64..2_470_000.0,
    ) {
        let state = fixed_state(lat, lon, alt, Vector3::from(vel));
        let body_to_sensor = mounting.to_matrix().unwrap();
        let attitude = NadirPointing::with_offset(&offset).unwrap();
        let nadir_to_body = attitude.nadir_to_body();

        let nadir_to_access = frames::access_frame_from_state(&state, RE).unwrap();
        let fixed_to_nadir = attitude.fixed_to_nadir(&state).unwrap();
        prop_assert!(is_orthonormal(&nadir_to_access, 1e-9));
        prop_assert!(is_orthonormal(&fixed_to_nadir, 1e-9));

        let to_access = frames::sensor_to_access_rotation(&body_to_sensor, &nadir_to_body, &nadir_to_access);
        let to_fixed = frames::sensor_to_fixed_rotation(&body_to_sensor, &nadir_to_body, &fixed_to_nadir);
        prop_assert!(is_orthonormal(&to_access, 1e-9));
        prop_assert!(is_orthonormal(&to_fixed, 1e-9));

        let earth = CentralBody::earth();
        let fixed_to_inertial = earth.inertial_to_fixed(jd).transpose();
        prop_assert!(is_orthonormal(&fixed_to_inertial, 1e-12));
        prop_assert!(is_orthonormal(&(fixed_to_inertial * to_fixed), 1e-9));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn test_grid_count_shrinks_with_cone(
        lat in latitude(),
        lon in longitude(),
        alt in 400.0f64..2000.0,
        heading in 0.0f64..TAU,
    ) {
        let earth = CentralBody::earth();
        let grid = PointGroup::global(3f64.to_radians()).unwrap();
        let north = Vector3::new(-lat.sin() * lon.cos(), -lat.sin() * lon.sin(), lat.cos());
        let east = Vector3::new(-lon.sin(), lon.cos(), 0.0);
        let state = fixed_state(lat, lon, alt, (north * heading.cos() + east * heading.sin()) * 7.5);
        let attitude = NadirPointing::new();

        let mut previous = usize::MAX;
        for half_angle_deg in [60.0, 40.0, 25.0, 10.0, 2.0, 0.1] {
            let sensor = ConicalSensor::new(f64::to_radians(half_angle_deg)).unwrap();
            let checker = CoverageChecker::new(&earth, &sensor, &attitude);
            let count = checker.check_grid_visibility(&grid, &state).unwrap().len();
            prop_assert!(count <= previous);
            previous = count;
        }
    }
}
