//! Discretized ground-point grids.

use crate::spherical::{from_spherical, wrap_longitude};
use crate::{CoverageError, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Ground point with a stable index into its grid. Angles in radians.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GroundPoint {
    pub index: usize,
    pub latitude: f64,
    pub longitude: f64,
}

/// Read-only access to an indexed set of ground points.
pub trait PointGrid {
    fn num_points(&self) -> usize;

    fn point(&self, index: usize) -> Option<GroundPoint>;

    /// Position of a point on a sphere of `radius`, body-fixed frame.
    fn position(&self, index: usize, radius: f64) -> Option<Vector3<f64>> {
        self.point(index)
            .map(|p| from_spherical(p.latitude, p.longitude, radius, 0.0))
    }

    fn lat_lon_vectors(&self) -> (Vec<f64>, Vec<f64>) {
        (0..self.num_points())
            .filter_map(|i| self.point(i))
            .map(|p| (p.latitude, p.longitude))
            .unzip()
    }
}

/// User-defined or generated list of points, indexed in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PointGroup {
    points: Vec<GroundPoint>,
}

impl PointGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append points; indices continue from the current count.
    pub fn add_user_defined_points(&mut self, lats: &[f64], lons: &[f64]) -> Result<()> {
        if lats.len() != lons.len() {
            return Err(CoverageError::InvalidInput(format!(
                "{} latitudes but {} longitudes",
                lats.len(),
                lons.len()
            )));
        }
        for (i, (&lat, &lon)) in lats.iter().zip(lons).enumerate() {
            if !(lat.is_finite() && (-FRAC_PI_2..=FRAC_PI_2).contains(&lat)) {
                return Err(CoverageError::InvalidInput(format!(
                    "latitude {} at position {} outside [-π/2, π/2]",
                    lat, i
                )));
            }
            if !(lon.is_finite() && (-TAU..=TAU).contains(&lon)) {
                return Err(CoverageError::InvalidInput(format!(
                    "longitude {} at position {} outside [-2π, 2π]",
                    lon, i
                )));
            }
        }
        let start = self.points.len();
        self.points.extend(
            lats.iter()
                .zip(lons)
                .enumerate()
                .map(|(i, (&latitude, &longitude))| GroundPoint {
                    index: start + i,
                    latitude,
                    longitude: wrap_longitude(longitude),
                }),
        );
        Ok(())
    }

    /// Tessellate a lat/lon box at roughly uniform spacing (radians).
    ///
    /// Rows step by `resolution` in latitude; within a row the longitude
    /// step is widened by `1/cos(lat)`. `lon_upper < lon_lower` spans the
    /// antimeridian.
    pub fn from_bounds(
        lat_upper: f64,
        lat_lower: f64,
        lon_upper: f64,
        lon_lower: f64,
        resolution: f64,
    ) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(CoverageError::InvalidInput(format!(
                "grid resolution must be positive, got {}",
                resolution
            )));
        }
        if !(-FRAC_PI_2..=FRAC_PI_2).contains(&lat_lower)
            || !(-FRAC_PI_2..=FRAC_PI_2).contains(&lat_upper)
            || lat_lower > lat_upper
        {
            return Err(CoverageError::InvalidInput(format!(
                "invalid latitude bounds [{}, {}]",
                lat_lower, lat_upper
            )));
        }
        let mut lon_span = lon_upper - lon_lower;
        if lon_span < 0.0 {
            lon_span += TAU;
        }
        let lon_span = lon_span.min(TAU);
        let full_circle = lon_span >= TAU - 1e-12;

        let mut lats = Vec::new();
        let mut lons = Vec::new();
        let n_rows = ((lat_upper - lat_lower) / resolution + 1e-9).floor() as usize;
        for row in 0..=n_rows {
            let lat = lat_lower + row as f64 * resolution;
            let cos_lat = lat.cos();
            if cos_lat < 1e-9 {
                lats.push(lat.clamp(-FRAC_PI_2, FRAC_PI_2));
                lons.push(0.0);
                continue;
            }
            let step = (resolution / cos_lat).min(TAU);
            let mut n_cols = (lon_span / step + 1e-9).floor() as usize;
            if full_circle && n_cols as f64 * step >= TAU - 1e-9 {
                n_cols = n_cols.saturating_sub(1);
            }
            for col in 0..=n_cols {
                lats.push(lat);
                lons.push(wrap_longitude(lon_lower + col as f64 * step));
            }
        }

        let mut group = Self::new();
        group.add_user_defined_points(&lats, &lons)?;
        Ok(group)
    }

    /// Whole-globe grid.
    pub fn global(resolution: f64) -> Result<Self> {
        Self::from_bounds(FRAC_PI_2, -FRAC_PI_2, PI, -PI, resolution)
    }

    pub fn points(&self) -> &[GroundPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PointGrid for PointGroup {
    fn num_points(&self) -> usize {
        self.points.len()
    }

    fn point(&self, index: usize) -> Option<GroundPoint> {
        self.points.get(index).copied()
    }
}
