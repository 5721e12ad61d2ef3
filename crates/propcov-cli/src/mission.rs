//! Propagate-and-check loop.

use crate::config::MissionConfig;
use crate::{PropcovError, Result};
use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::propagation::Propagator;
use orbital_mechanics::{time, CentralBody, StateVector};
use sensor_coverage::{
    CoverageChecker, NadirPointing, PointGrid, PointGroup, ProjectedPoint, SensorModel,
    VisibleSet,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// Everything known about one propagation step.
#[derive(Debug, Clone)]
pub struct MissionStep {
    pub index: usize,
    /// Seconds since the mission epoch.
    pub time_s: f64,
    /// Inertial state at `time_s`.
    pub state: StateVector,
    pub visible: VisibleSet,
    /// Projected sensor boundary; empty unless footprints were requested.
    pub footprint: Vec<ProjectedPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissionSummary {
    pub epoch_jd: f64,
    pub duration_days: f64,
    pub step_size_s: f64,
    pub steps: usize,
    pub grid_points: usize,
    /// Steps with at least one visible grid point.
    pub access_rows: usize,
    /// Grid points seen at least once.
    pub points_accessed: usize,
    pub yaw180: bool,
    pub wall_seconds: f64,
}

pub struct MissionRun<'a> {
    body: &'a CentralBody,
    grid: &'a PointGroup,
    propagator: Box<dyn Propagator>,
    sensor: Box<dyn SensorModel + Send + Sync>,
    epoch: DateTime<Utc>,
    duration_s: f64,
    step_size_s: f64,
    yaw180: bool,
    footprint: bool,
}

impl<'a> MissionRun<'a> {
    pub fn from_config(
        config: &MissionConfig,
        body: &'a CentralBody,
        grid: &'a PointGroup,
    ) -> Result<Self> {
        config.validate()?;
        if grid.is_empty() {
            return Err(PropcovError::EmptyGrid);
        }
        Ok(Self {
            body,
            grid,
            propagator: config.propagator(body)?,
            sensor: config.sensor()?,
            epoch: config.epoch()?,
            duration_s: config.duration_s(),
            step_size_s: config.step_size_s,
            yaw180: config.yaw180,
            footprint: config.outputs.footprint.is_some(),
        })
    }

    pub fn with_footprint(mut self, enabled: bool) -> Self {
        self.footprint = enabled;
        self
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn epoch_jd(&self) -> f64 {
        time::julian_date(self.epoch)
    }

    pub fn num_steps(&self) -> usize {
        (self.duration_s / self.step_size_s).ceil() as usize
    }

    fn time_at(&self, index: usize) -> (f64, DateTime<Utc>) {
        let t = index as f64 * self.step_size_s;
        (t, self.epoch + Duration::nanoseconds((t * 1e9).round() as i64))
    }

    /// Run every step, handing each to `on_step` as soon as it is evaluated.
    pub fn run<F>(&self, mut on_step: F) -> Result<MissionSummary>
    where
        F: FnMut(&MissionStep) -> Result<()>,
    {
        let started = Instant::now();
        let nominal = NadirPointing::new();
        let flipped = nominal.yaw_flipped()?;
        let sensor: &(dyn SensorModel + Send + Sync) = self.sensor.as_ref();
        let checker = CoverageChecker::new(self.body, sensor, &nominal);
        let flipped_checker = CoverageChecker::new(self.body, sensor, &flipped);

        let n_steps = self.num_steps();
        info!(
            steps = n_steps,
            grid_points = self.grid.num_points(),
            yaw180 = self.yaw180,
            "Starting propagation"
        );

        let mut ever_seen = BTreeSet::new();
        let mut access_rows = 0;
        let mut steps = 0;
        for index in 0.. {
            let (time_s, at) = self.time_at(index);
            if time_s >= self.duration_s {
                break;
            }
            let state = self.propagator.propagate(at)?;

            let mut visible = checker.check_grid_visibility(self.grid, &state)?;
            if self.yaw180 {
                visible.extend(flipped_checker.check_grid_visibility(self.grid, &state)?);
            }
            let footprint = if self.footprint {
                checker.check_intersection(&state)?
            } else {
                Vec::new()
            };
            debug!(step = index, time_s, visible = visible.len(), "step evaluated");

            if !visible.is_empty() {
                access_rows += 1;
                ever_seen.extend(visible.iter().copied());
            }
            let step = MissionStep {
                index,
                time_s,
                state,
                visible,
                footprint,
            };
            on_step(&step)?;
            steps += 1;

            if n_steps >= 10 && (index + 1) % (n_steps / 10) == 0 {
                info!("  {}/{} steps", index + 1, n_steps);
            }
        }

        let summary = MissionSummary {
            epoch_jd: self.epoch_jd(),
            duration_days: self.duration_s / time::SECONDS_PER_DAY,
            step_size_s: self.step_size_s,
            steps,
            grid_points: self.grid.num_points(),
            access_rows,
            points_accessed: ever_seen.len(),
            yaw180: self.yaw180,
            wall_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            steps = summary.steps,
            points_accessed = summary.points_accessed,
            wall_seconds = summary.wall_seconds,
            "Propagation finished"
        );
        Ok(summary)
    }
}
