//! Orbital Mechanics Library
//!
//! State vectors, Keplerian and SGP4 propagation, epochs, and the
//! inertial/body-fixed transforms that feed the sensor coverage engine.
//!
//! Units are kilometres, kilometres per second and radians unless a field
//! name says otherwise.

use chrono::{DateTime, Utc};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("Invalid orbital elements: {0}")]
    InvalidElements(String),
    #[error("Invalid epoch: {0}")]
    InvalidEpoch(String),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Frame a state vector is expressed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frame {
    /// Body-centred inertial (e.g. Earth-centred inertial, TEME for SGP4 output).
    Inertial,
    /// Body-centred, rotating with the central body.
    BodyFixed,
}

/// Cartesian position and velocity tagged with frame and epoch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateVector {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub frame: Frame,
    pub epoch: DateTime<Utc>,
}

impl StateVector {
    pub fn new(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        frame: Frame,
        epoch: DateTime<Utc>,
    ) -> Self {
        Self {
            position,
            velocity,
            frame,
            epoch,
        }
    }

    pub fn julian_date(&self) -> f64 {
        time::julian_date(self.epoch)
    }

    pub fn radius(&self) -> f64 {
        self.position.norm()
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Row layout used by state files: `[x, y, z, vx, vy, vz]`.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
        ]
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeodeticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

/// How the prime meridian of a central body moves with time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BodyRotation {
    /// Greenwich mean sidereal time (Earth).
    Gmst,
    /// Prime meridian angle at J2000 plus a constant rate.
    Uniform { angle_at_j2000: f64, rate_rad_s: f64 },
}

/// Reference body model: shape, gravity and rotation.
///
/// Nothing in the coverage engine assumes Earth; everything reads the
/// radius and rotation from here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralBody {
    pub name: String,
    pub equatorial_radius_km: f64,
    pub flattening: f64,
    pub mu_km3_s2: f64,
    pub j2: f64,
    pub rotation: BodyRotation,
}

impl CentralBody {
    /// WGS-84 Earth.
    pub fn earth() -> Self {
        Self {
            name: "Earth".to_string(),
            equatorial_radius_km: 6378.137,
            flattening: 1.0 / 298.257223563,
            mu_km3_s2: 398600.4415,
            j2: 1.0826269e-3,
            rotation: BodyRotation::Gmst,
        }
    }

    /// Perfect sphere with a uniformly rotating prime meridian.
    pub fn sphere(name: &str, radius_km: f64, mu_km3_s2: f64, rate_rad_s: f64) -> Self {
        Self {
            name: name.to_string(),
            equatorial_radius_km: radius_km,
            flattening: 0.0,
            mu_km3_s2,
            j2: 0.0,
            rotation: BodyRotation::Uniform {
                angle_at_j2000: 0.0,
                rate_rad_s,
            },
        }
    }

    pub fn radius(&self) -> f64 {
        self.equatorial_radius_km
    }

    pub fn polar_radius_km(&self) -> f64 {
        self.equatorial_radius_km * (1.0 - self.flattening)
    }

    /// Angle of the prime meridian from the inertial x-axis, in `[0, 2π)`.
    pub fn prime_meridian_angle(&self, jd: f64) -> f64 {
        match self.rotation {
            BodyRotation::Gmst => time::gmst(jd),
            BodyRotation::Uniform {
                angle_at_j2000,
                rate_rad_s,
            } => {
                let seconds = (jd - time::J2000_JD) * time::SECONDS_PER_DAY;
                (angle_at_j2000 + rate_rad_s * seconds).rem_euclid(TAU)
            }
        }
    }

    /// Passive rotation taking inertial components to body-fixed components.
    pub fn inertial_to_fixed(&self, jd: f64) -> Matrix3<f64> {
        transforms::rot_z(self.prime_meridian_angle(jd))
    }

    /// Express a state in the body-fixed frame.
    ///
    /// Velocity is rotated but the ω×r transport term is not subtracted;
    /// consumers only need the inertial velocity direction seen in fixed axes.
    pub fn to_body_fixed(&self, state: &StateVector) -> StateVector {
        match state.frame {
            Frame::BodyFixed => *state,
            Frame::Inertial => {
                let r = self.inertial_to_fixed(state.julian_date());
                StateVector::new(
                    r * state.position,
                    r * state.velocity,
                    Frame::BodyFixed,
                    state.epoch,
                )
            }
        }
    }

    pub fn to_inertial(&self, state: &StateVector) -> StateVector {
        match state.frame {
            Frame::Inertial => *state,
            Frame::BodyFixed => {
                let r = self.inertial_to_fixed(state.julian_date()).transpose();
                StateVector::new(
                    r * state.position,
                    r * state.velocity,
                    Frame::Inertial,
                    state.epoch,
                )
            }
        }
    }
}

pub mod time {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    pub const J2000_JD: f64 = 2451545.0;
    pub const UNIX_EPOCH_JD: f64 = 2440587.5;
    pub const SECONDS_PER_DAY: f64 = 86400.0;

    pub fn julian_date(time: DateTime<Utc>) -> f64 {
        let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
        UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY
    }

    /// Greenwich mean sidereal time in radians (IAU-82).
    pub fn gmst(jd: f64) -> f64 {
        let t = (jd - J2000_JD) / 36525.0;
        let seconds = 67310.54841 + (876600.0 * 3600.0 + 8640184.812866) * t
            + 0.093104 * t * t
            - 6.2e-6 * t * t * t;
        (seconds.rem_euclid(SECONDS_PER_DAY) / 240.0).to_radians().rem_euclid(TAU)
    }

    /// Build a UTC epoch from Gregorian calendar fields (seconds may be fractional).
    pub fn from_gregorian(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: f64,
    ) -> Result<DateTime<Utc>> {
        if !(0.0..61.0).contains(&second) {
            return Err(OrbitalError::InvalidEpoch(format!("second out of range: {}", second)));
        }
        let whole = second.trunc() as u32;
        let nanos = ((second - second.trunc()) * 1e9).round() as u32;
        let naive = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_nano_opt(hour, minute, whole, nanos.min(999_999_999)))
            .ok_or_else(|| {
                OrbitalError::InvalidEpoch(format!(
                    "{}-{:02}-{:02} {:02}:{:02}:{}",
                    year, month, day, hour, minute, second
                ))
            })?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}

/// Classical orbital elements. Distances in km, angles in radians.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeplerianElements {
    pub sma: f64,
    pub ecc: f64,
    pub inc: f64,
    pub raan: f64,
    pub aop: f64,
    pub ta: f64,
}

impl KeplerianElements {
    pub fn validate(&self) -> Result<()> {
        if !(self.sma.is_finite() && self.sma > 0.0) {
            return Err(OrbitalError::InvalidElements(format!(
                "semi-major axis must be positive, got {}",
                self.sma
            )));
        }
        if !(0.0..1.0).contains(&self.ecc) {
            return Err(OrbitalError::InvalidElements(format!(
                "only elliptical orbits are supported, eccentricity {}",
                self.ecc
            )));
        }
        Ok(())
    }

    pub fn mean_motion(&self, mu: f64) -> f64 {
        (mu / self.sma.powi(3)).sqrt()
    }

    pub fn period(&self, mu: f64) -> f64 {
        TAU / self.mean_motion(mu)
    }

    /// Inertial position and velocity for these elements.
    pub fn to_cartesian(&self, mu: f64) -> Result<(Vector3<f64>, Vector3<f64>)> {
        self.validate()?;
        let p = self.sma * (1.0 - self.ecc * self.ecc);
        let (sin_ta, cos_ta) = self.ta.sin_cos();
        let r = p / (1.0 + self.ecc * cos_ta);

        let r_pqw = Vector3::new(r * cos_ta, r * sin_ta, 0.0);
        let v_pqw = Vector3::new(-sin_ta, self.ecc + cos_ta, 0.0) * (mu / p).sqrt();

        let to_inertial = transforms::rot_z(-self.raan)
            * transforms::rot_x(-self.inc)
            * transforms::rot_z(-self.aop);
        Ok((to_inertial * r_pqw, to_inertial * v_pqw))
    }
}

pub mod anomaly {
    use super::*;

    const KEPLER_TOLERANCE: f64 = 1e-12;
    const KEPLER_MAX_ITER: usize = 50;

    pub fn true_to_mean(ta: f64, ecc: f64) -> f64 {
        let ea = 2.0 * (((1.0 - ecc) / (1.0 + ecc)).sqrt() * (ta / 2.0).tan()).atan();
        (ea - ecc * ea.sin()).rem_euclid(TAU)
    }

    /// Solve Kepler's equation by Newton iteration.
    pub fn mean_to_eccentric(ma: f64, ecc: f64) -> Result<f64> {
        let ma = ma.rem_euclid(TAU);
        let mut ea = if ecc < 0.8 { ma } else { PI };
        for _ in 0..KEPLER_MAX_ITER {
            let delta = (ea - ecc * ea.sin() - ma) / (1.0 - ecc * ea.cos());
            ea -= delta;
            if delta.abs() < KEPLER_TOLERANCE {
                return Ok(ea);
            }
        }
        Err(OrbitalError::PropagationFailed(format!(
            "Kepler's equation did not converge (M={}, e={})",
            ma, ecc
        )))
    }

    pub fn mean_to_true(ma: f64, ecc: f64) -> Result<f64> {
        let ea = mean_to_eccentric(ma, ecc)?;
        let ta = 2.0 * (((1.0 + ecc) / (1.0 - ecc)).sqrt() * (ea / 2.0).tan()).atan();
        Ok(ta.rem_euclid(TAU))
    }
}

pub mod propagation {
    use super::*;
    use tracing::trace;

    /// Anything that can produce an inertial state at a requested time.
    pub trait Propagator {
        fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector>;
    }

    /// Two-body propagation with optional J2 secular drift.
    #[derive(Debug, Clone)]
    pub struct KeplerPropagator {
        elements: KeplerianElements,
        epoch: DateTime<Utc>,
        body: CentralBody,
        j2_secular: bool,
    }

    impl KeplerPropagator {
        pub fn new(
            elements: KeplerianElements,
            epoch: DateTime<Utc>,
            body: CentralBody,
        ) -> Result<Self> {
            elements.validate()?;
            Ok(Self {
                elements,
                epoch,
                body,
                j2_secular: true,
            })
        }

        pub fn with_j2_secular(mut self, enabled: bool) -> Self {
            self.j2_secular = enabled;
            self
        }

        pub fn epoch(&self) -> DateTime<Utc> {
            self.epoch
        }

        /// Secular rates `(raan_dot, aop_dot, mean_anomaly_dot)` in rad/s.
        pub fn secular_rates(&self) -> (f64, f64, f64) {
            let el = &self.elements;
            let n = el.mean_motion(self.body.mu_km3_s2);
            if !self.j2_secular || self.body.j2 == 0.0 {
                return (0.0, 0.0, n);
            }
            let p = el.sma * (1.0 - el.ecc * el.ecc);
            let k = 1.5 * n * self.body.j2 * (self.body.equatorial_radius_km / p).powi(2);
            let sin2_i = el.inc.sin().powi(2);
            let raan_dot = -k * el.inc.cos();
            let aop_dot = k * (2.0 - 2.5 * sin2_i);
            let ma_dot = n + k * (1.0 - el.ecc * el.ecc).sqrt() * (1.0 - 1.5 * sin2_i);
            (raan_dot, aop_dot, ma_dot)
        }
    }

    impl Propagator for KeplerPropagator {
        fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
            let dt = (time - self.epoch)
                .num_nanoseconds()
                .map(|ns| ns as f64 * 1e-9)
                .unwrap_or_else(|| (time - self.epoch).num_milliseconds() as f64 * 1e-3);

            let el = self.elements;
            let (raan_dot, aop_dot, ma_dot) = self.secular_rates();
            let ma0 = anomaly::true_to_mean(el.ta, el.ecc);
            let ta = anomaly::mean_to_true(ma0 + ma_dot * dt, el.ecc)?;

            let current = KeplerianElements {
                raan: (el.raan + raan_dot * dt).rem_euclid(TAU),
                aop: (el.aop + aop_dot * dt).rem_euclid(TAU),
                ta,
                ..el
            };
            trace!(dt, ta = current.ta, "kepler propagate");

            let (position, velocity) = current.to_cartesian(self.body.mu_km3_s2)?;
            Ok(StateVector::new(position, velocity, Frame::Inertial, time))
        }
    }

    /// SGP4 propagation from a two-line element set.
    pub struct TlePropagator {
        constants: sgp4::Constants,
        epoch: DateTime<Utc>,
    }

    impl TlePropagator {
        pub fn from_tle(tle_line1: &str, tle_line2: &str) -> Result<Self> {
            let elements =
                sgp4::Elements::from_tle(None, tle_line1.as_bytes(), tle_line2.as_bytes())
                    .map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;
            let constants = sgp4::Constants::from_elements(&elements)
                .map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;
            let epoch = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);
            Ok(Self { constants, epoch })
        }

        pub fn epoch(&self) -> DateTime<Utc> {
            self.epoch
        }
    }

    impl Propagator for TlePropagator {
        fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
            let duration = time.signed_duration_since(self.epoch);
            let minutes_since_epoch = duration.num_milliseconds() as f64 / 60_000.0;

            let prediction = self
                .constants
                .propagate(minutes_since_epoch)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            Ok(StateVector::new(
                Vector3::from(prediction.position),
                Vector3::from(prediction.velocity),
                Frame::Inertial,
                time,
            ))
        }
    }
}

pub mod transforms {
    use super::*;

    const GEODETIC_TOLERANCE: f64 = 1e-12;
    const GEODETIC_MAX_ITER: usize = 20;

    /// Passive rotation about x.
    pub fn rot_x(angle: f64) -> Matrix3<f64> {
        let (s, c) = angle.sin_cos();
        Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c)
    }

    /// Passive rotation about y.
    pub fn rot_y(angle: f64) -> Matrix3<f64> {
        let (s, c) = angle.sin_cos();
        Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c)
    }

    /// Passive rotation about z.
    pub fn rot_z(angle: f64) -> Matrix3<f64> {
        let (s, c) = angle.sin_cos();
        Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0)
    }

    /// Body-fixed Cartesian to geodetic latitude/longitude (degrees) and height.
    pub fn ecef_to_geodetic(position: &Vector3<f64>, body: &CentralBody) -> Result<GeodeticPosition> {
        let (x, y, z) = (position.x, position.y, position.z);
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(OrbitalError::InvalidCoordinates(format!("{:?}", position)));
        }
        let a = body.equatorial_radius_km;
        let f = body.flattening;
        let e2 = f * (2.0 - f);
        let p = (x * x + y * y).sqrt();
        let longitude = y.atan2(x);

        if p < GEODETIC_TOLERANCE {
            let b = body.polar_radius_km();
            return Ok(GeodeticPosition {
                latitude: if z >= 0.0 { 90.0 } else { -90.0 },
                longitude: longitude.to_degrees(),
                altitude_km: z.abs() - b,
            });
        }

        let mut lat = z.atan2(p * (1.0 - e2));
        let mut height = 0.0;
        for _ in 0..GEODETIC_MAX_ITER {
            let sin_lat = lat.sin();
            let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
            height = p / lat.cos() - n;
            let next = z.atan2(p * (1.0 - e2 * n / (n + height)));
            let converged = (next - lat).abs() < GEODETIC_TOLERANCE;
            lat = next;
            if converged {
                break;
            }
        }

        Ok(GeodeticPosition {
            latitude: lat.to_degrees(),
            longitude: longitude.to_degrees(),
            altitude_km: height,
        })
    }

    pub fn geodetic_to_ecef(pos: &GeodeticPosition, body: &CentralBody) -> Vector3<f64> {
        let lat_rad = pos.latitude.to_radians();
        let lon_rad = pos.longitude.to_radians();
        let alt = pos.altitude_km;
        let e2 = body.flattening * (2.0 - body.flattening);

        let n = body.equatorial_radius_km / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

        Vector3::new(
            (n + alt) * lat_rad.cos() * lon_rad.cos(),
            (n + alt) * lat_rad.cos() * lon_rad.sin(),
            (n * (1.0 - e2) + alt) * lat_rad.sin(),
        )
    }
}
