//! Orbit Propagation and Coverage
//!
//! Propagates one satellite from a mission configuration, evaluates which
//! points of a coverage grid its sensor sees at every step, and writes:
//!
//! | Output | Content |
//! |--------|---------|
//! | states | inertial position/velocity per step |
//! | access | one row per step with at least one visible grid point |
//! | summary | JSON run statistics |
//! | footprint | optional GeoJSON trace of the projected sensor boundary |
//!
//! Time columns are seconds since the mission epoch.

use thiserror::Error;

pub mod config;
pub mod grid_file;
pub mod mission;
pub mod report;

pub use config::{MissionConfig, OrbitConfig, OutputConfig, SensorConfig};
pub use mission::{MissionRun, MissionStep, MissionSummary};

#[derive(Error, Debug)]
pub enum PropcovError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid mission configuration: {0}")]
    Config(String),
    #[error("Coverage grid line {line}: {message}")]
    Grid { line: usize, message: String },
    #[error("Coverage grid is empty")]
    EmptyGrid,
    #[error(transparent)]
    Coverage(#[from] sensor_coverage::CoverageError),
    #[error(transparent)]
    Orbital(#[from] orbital_mechanics::OrbitalError),
}

pub type Result<T> = std::result::Result<T, PropcovError>;
