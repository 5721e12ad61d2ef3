//! Coverage grid loading from CSV files.
//!
//! One header line, then `regi,gpi,lat,lon` rows with angles in degrees.
//! Grid point indices in the output files follow row order.

use crate::{PropcovError, Result};
use sensor_coverage::PointGroup;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Validate latitude is in valid range
fn is_valid_latitude(lat: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && lat.is_finite()
}

/// Validate longitude is in valid range (both -180..180 and 0..360 grids occur)
fn is_valid_longitude(lon: f64) -> bool {
    (-180.0..=360.0).contains(&lon) && lon.is_finite()
}

fn parse_field(field: Option<&str>, name: &str, line: usize) -> Result<f64> {
    let raw = field.map(str::trim).ok_or_else(|| PropcovError::Grid {
        line,
        message: format!("missing {} column", name),
    })?;
    raw.parse::<f64>().map_err(|e| PropcovError::Grid {
        line,
        message: format!("{} {:?}: {}", name, raw, e),
    })
}

/// Parse grid rows from any reader.
pub fn parse_grid(reader: impl BufRead) -> Result<PointGroup> {
    let mut lats = Vec::new();
    let mut lons = Vec::new();

    // Line numbers are 1-based and include the header.
    for (i, line) in reader.lines().enumerate().skip(1) {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        // regi, gpi
        fields.next();
        fields.next();
        let lat = parse_field(fields.next(), "lat", line_no)?;
        let lon = parse_field(fields.next(), "lon", line_no)?;
        if !is_valid_latitude(lat) {
            return Err(PropcovError::Grid {
                line: line_no,
                message: format!("latitude {} outside [-90, 90]", lat),
            });
        }
        if !is_valid_longitude(lon) {
            return Err(PropcovError::Grid {
                line: line_no,
                message: format!("longitude {} outside [-180, 360]", lon),
            });
        }
        lats.push(lat.to_radians());
        lons.push(lon.to_radians());
    }

    if lats.is_empty() {
        return Err(PropcovError::EmptyGrid);
    }
    let mut group = PointGroup::new();
    group.add_user_defined_points(&lats, &lons)?;
    Ok(group)
}

pub fn load_grid(path: impl AsRef<Path>) -> Result<PointGroup> {
    let path = path.as_ref();
    info!("Loading coverage grid from {:?}", path);
    let group = parse_grid(BufReader::new(File::open(path)?))?;
    info!("Loaded {} grid points", group.points().len());
    Ok(group)
}
