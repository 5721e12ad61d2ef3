//! Mission configuration (JSON).
//!
//! ```json
//! {
//!   "epoch": [2018, 5, 26, 12, 0, 0],
//!   "orbit": { "type": "keplerian", "sma_km": 7078.137, "ecc": 0.001,
//!              "inc_deg": 98.2, "raan_deg": 0, "aop_deg": 0, "ta_deg": 0 },
//!   "duration_days": 0.25,
//!   "step_size_s": 10,
//!   "grid_file": "grid.csv",
//!   "sensor": { "type": "conical", "cone_deg": 25 },
//!   "yaw180": false
//! }
//! ```
//!
//! `body` is optional and defaults to WGS-84 Earth:
//!
//! ```json
//! "body": { "name": "Mars", "equatorial_radius_km": 3396.19, "flattening": 0.0,
//!           "mu_km3_s2": 42828.37, "j2": 0.0,
//!           "rotation": { "uniform": { "angle_at_j2000": 0.0, "rate_rad_s": 7.088218e-5 } } }
//! ```

use crate::{PropcovError, Result};
use chrono::{DateTime, Utc};
use orbital_mechanics::propagation::{KeplerPropagator, Propagator, TlePropagator};
use orbital_mechanics::{time, CentralBody, KeplerianElements};
use sensor_coverage::{ConicalSensor, CustomSensor, Orientation, SensorModel};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Body-to-sensor orientation `[seq1, seq2, seq3, angle1, angle2, angle3]`, degrees.
pub type OrientationArray = [f64; 6];

fn default_orientation() -> OrientationArray {
    [1.0, 2.0, 3.0, 0.0, 0.0, 0.0]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrbitConfig {
    Keplerian {
        sma_km: f64,
        ecc: f64,
        inc_deg: f64,
        raan_deg: f64,
        aop_deg: f64,
        ta_deg: f64,
        /// Apply J2 secular drift to the node, perigee and mean anomaly.
        #[serde(default)]
        j2: bool,
    },
    Tle {
        line1: String,
        line2: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorConfig {
    Conical {
        cone_deg: f64,
        #[serde(default = "default_orientation")]
        orientation: OrientationArray,
    },
    Rectangular {
        along_track_deg: f64,
        cross_track_deg: f64,
        #[serde(default = "default_orientation")]
        orientation: OrientationArray,
    },
    Custom {
        cone_deg: Vec<f64>,
        clock_deg: Vec<f64>,
        #[serde(default = "default_orientation")]
        orientation: OrientationArray,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "default_states_path")]
    pub states: PathBuf,
    #[serde(default = "default_access_path")]
    pub access: PathBuf,
    #[serde(default)]
    pub summary: Option<PathBuf>,
    #[serde(default)]
    pub footprint: Option<PathBuf>,
}

fn default_states_path() -> PathBuf {
    PathBuf::from("sat_states.csv")
}

fn default_access_path() -> PathBuf {
    PathBuf::from("sat_access.csv")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            states: default_states_path(),
            access: default_access_path(),
            summary: None,
            footprint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionConfig {
    /// `[year, month, day, hour, minute, second]`, UTC.
    pub epoch: [f64; 6],
    pub orbit: OrbitConfig,
    pub duration_days: f64,
    pub step_size_s: f64,
    pub grid_file: PathBuf,
    pub sensor: SensorConfig,
    /// Also look with the spacecraft yawed 180° and merge the access.
    #[serde(default)]
    pub yaw180: bool,
    #[serde(default)]
    pub outputs: OutputConfig,
    /// Central body the grid and orbit refer to. Earth when omitted.
    #[serde(default = "CentralBody::earth")]
    pub body: CentralBody,
}

impl MissionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading mission configuration from {:?}", path);
        let reader = BufReader::new(File::open(path)?);
        let config: MissionConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.duration_days.is_finite() && self.duration_days > 0.0) {
            return Err(PropcovError::Config(format!(
                "duration_days must be positive, got {}",
                self.duration_days
            )));
        }
        if !(self.step_size_s.is_finite() && self.step_size_s > 0.0) {
            return Err(PropcovError::Config(format!(
                "step_size_s must be positive, got {}",
                self.step_size_s
            )));
        }
        self.epoch()?;
        let body = &self.body;
        if !(body.equatorial_radius_km.is_finite()
            && body.equatorial_radius_km > 0.0
            && body.mu_km3_s2.is_finite()
            && body.mu_km3_s2 > 0.0
            && (0.0..1.0).contains(&body.flattening))
        {
            return Err(PropcovError::Config(format!(
                "central body {:?} needs a positive radius and mu, and flattening in [0, 1)",
                body.name
            )));
        }
        match &self.sensor {
            SensorConfig::Custom {
                cone_deg,
                clock_deg,
                ..
            } if cone_deg.len() != clock_deg.len() => Err(PropcovError::Config(format!(
                "custom sensor has {} cone and {} clock angles",
                cone_deg.len(),
                clock_deg.len()
            ))),
            _ => Ok(()),
        }
    }

    pub fn epoch(&self) -> Result<DateTime<Utc>> {
        let [year, month, day, hour, minute, second] = self.epoch;
        let fields = [year, month, day, hour, minute];
        if fields.iter().any(|f| f.fract() != 0.0 || *f < 0.0) {
            return Err(PropcovError::Config(format!(
                "epoch calendar fields must be whole numbers: {:?}",
                self.epoch
            )));
        }
        Ok(time::from_gregorian(
            year as i32,
            month as u32,
            day as u32,
            hour as u32,
            minute as u32,
            second,
        )?)
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_days * time::SECONDS_PER_DAY
    }

    /// Propagator for the configured orbit. TLE orbits keep their own epoch.
    pub fn propagator(&self, body: &CentralBody) -> Result<Box<dyn Propagator>> {
        match &self.orbit {
            OrbitConfig::Keplerian {
                sma_km,
                ecc,
                inc_deg,
                raan_deg,
                aop_deg,
                ta_deg,
                j2,
            } => {
                let elements = KeplerianElements {
                    sma: *sma_km,
                    ecc: *ecc,
                    inc: inc_deg.to_radians(),
                    raan: raan_deg.to_radians(),
                    aop: aop_deg.to_radians(),
                    ta: ta_deg.to_radians(),
                };
                let propagator = KeplerPropagator::new(elements, self.epoch()?, body.clone())?
                    .with_j2_secular(*j2);
                Ok(Box::new(propagator))
            }
            OrbitConfig::Tle { line1, line2 } => {
                Ok(Box::new(TlePropagator::from_tle(line1, line2)?))
            }
        }
    }

    /// Sensor model for the configured field of view.
    pub fn sensor(&self) -> Result<Box<dyn SensorModel + Send + Sync>> {
        let sensor: Box<dyn SensorModel + Send + Sync> = match &self.sensor {
            SensorConfig::Conical {
                cone_deg,
                orientation,
            } => Box::new(
                ConicalSensor::new(cone_deg.to_radians())?
                    .with_orientation(&parse_orientation(orientation)?)?,
            ),
            SensorConfig::Rectangular {
                along_track_deg,
                cross_track_deg,
                orientation,
            } => Box::new(
                CustomSensor::rectangular(
                    along_track_deg.to_radians(),
                    cross_track_deg.to_radians(),
                )?
                .with_orientation(&parse_orientation(orientation)?)?,
            ),
            SensorConfig::Custom {
                cone_deg,
                clock_deg,
                orientation,
            } => {
                let cone: Vec<f64> = cone_deg.iter().map(|d| d.to_radians()).collect();
                let clock: Vec<f64> = clock_deg.iter().map(|d| d.to_radians()).collect();
                Box::new(
                    CustomSensor::new(&cone, &clock)?
                        .with_orientation(&parse_orientation(orientation)?)?,
                )
            }
        };
        Ok(sensor)
    }
}

/// `[seq1, seq2, seq3, a1, a2, a3]` (degrees) to an [`Orientation`].
pub fn parse_orientation(values: &OrientationArray) -> Result<Orientation> {
    let mut sequence = [0u8; 3];
    for (slot, value) in sequence.iter_mut().zip(&values[..3]) {
        if !(value.fract() == 0.0 && (1.0..=3.0).contains(value)) {
            return Err(PropcovError::Config(format!(
                "orientation sequence entries must be 1, 2 or 3, got {:?}",
                &values[..3]
            )));
        }
        *slot = *value as u8;
    }
    Ok(Orientation::from_degrees(
        [values[3], values[4], values[5]],
        sequence,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"{
        "epoch": [2018, 5, 26, 12, 0, 0],
        "orbit": { "type": "keplerian", "sma_km": 7078.137, "ecc": 0.001,
                   "inc_deg": 98.2, "raan_deg": 10, "aop_deg": 0, "ta_deg": 0 },
        "duration_days": 0.01,
        "step_size_s": 60,
        "grid_file": "grid.csv",
        "sensor": { "type": "rectangular", "along_track_deg": 5, "cross_track_deg": 15,
                    "orientation": [1, 2, 3, 0, 10, 0] },
        "yaw180": true
    }"#;

    #[test]
    fn test_load_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = MissionConfig::load(file.path()).unwrap();
        assert!(config.yaw180);
        assert_eq!(config.outputs, OutputConfig::default());
        assert!((config.duration_s() - 864.0).abs() < 1e-9);
        assert!(matches!(config.orbit, OrbitConfig::Keplerian { j2: false, .. }));
        assert_eq!(config.sensor().unwrap().corner_headings().len(), 4);
    }

    #[test]
    fn test_body_defaults_to_earth() {
        let config: MissionConfig = serde_json::from_str(CONFIG).unwrap();
        assert_eq!(config.body, CentralBody::earth());
    }

    #[test]
    fn test_custom_body_from_json() {
        let mut value: serde_json::Value = serde_json::from_str(CONFIG).unwrap();
        value["body"] = serde_json::json!({
            "name": "Mars",
            "equatorial_radius_km": 3396.19,
            "flattening": 0.0,
            "mu_km3_s2": 42828.37,
            "j2": 0.0,
            "rotation": { "uniform": { "angle_at_j2000": 0.0, "rate_rad_s": 7.088218e-5 } }
        });
        value["orbit"]["sma_km"] = serde_json::json!(3796.19);
        let config: MissionConfig = serde_json::from_value(value).unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.body,
            CentralBody::sphere("Mars", 3396.19, 42828.37, 7.088218e-5)
        );

        let propagator = config.propagator(&config.body).unwrap();
        let state = propagator.propagate(config.epoch().unwrap()).unwrap();
        assert!((state.radius() - 3796.19 * (1.0 - 0.001)).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_body() {
        let mut config: MissionConfig = serde_json::from_str(CONFIG).unwrap();
        config.body.equatorial_radius_km = -1.0;
        assert!(matches!(config.validate(), Err(PropcovError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_step() {
        let mut config: MissionConfig = serde_json::from_str(CONFIG).unwrap();
        config.step_size_s = 0.0;
        assert!(matches!(config.validate(), Err(PropcovError::Config(_))));
    }

    #[test]
    fn test_rejects_mismatched_custom_sensor() {
        let mut config: MissionConfig = serde_json::from_str(CONFIG).unwrap();
        config.sensor = SensorConfig::Custom {
            cone_deg: vec![10.0, 10.0, 10.0],
            clock_deg: vec![0.0, 120.0],
            orientation: default_orientation(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_orientation() {
        let o = parse_orientation(&[3.0, 1.0, 3.0, 90.0, 0.0, 0.0]).unwrap();
        assert_eq!(o.sequence, [3, 1, 3]);
        assert!((o.angles[0] - std::f64::consts::FRAC_PI_2).abs() < 1e-15);
        assert!(parse_orientation(&[1.5, 2.0, 3.0, 0.0, 0.0, 0.0]).is_err());
        assert!(parse_orientation(&[0.0, 2.0, 3.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_epoch_and_propagator() {
        let config: MissionConfig = serde_json::from_str(CONFIG).unwrap();
        let epoch = config.epoch().unwrap();
        assert!((time::julian_date(epoch) - 2458265.0).abs() < 1e-9);

        let propagator = config.propagator(&CentralBody::earth()).unwrap();
        let state = propagator.propagate(epoch).unwrap();
        assert!((state.radius() - 7078.137 * (1.0 - 0.001)).abs() < 1e-6);
    }
}
