//! Output files: satellite states, access matrix, summary and footprint trace.

use crate::mission::{MissionStep, MissionSummary};
use crate::Result;
use sensor_coverage::ProjectedPoint;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Decimal places for every number written to the CSV outputs.
const PRECISION: usize = 16;

fn write_preamble(out: &mut impl Write, epoch_jd: f64, duration_days: f64) -> Result<()> {
    writeln!(out, "Satellite states are in Earth-Centered-Inertial equatorial plane.")?;
    writeln!(out, "Epoch[JDUT1] is {:.*}", PRECISION, epoch_jd)?;
    writeln!(out, "All time is referenced to the Epoch.")?;
    writeln!(out, "Mission Duration [Days] is {:.*}", PRECISION, duration_days)?;
    Ok(())
}

/// One `Time[s],X,Y,Z,VX,VY,VZ` row per step.
pub struct StateWriter<W: Write> {
    out: W,
}

impl StateWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, epoch_jd: f64, duration_days: f64) -> Result<Self> {
        info!("Writing satellite states to {:?}", path.as_ref());
        Self::new(BufWriter::new(File::create(path)?), epoch_jd, duration_days)
    }
}

impl<W: Write> StateWriter<W> {
    pub fn new(mut out: W, epoch_jd: f64, duration_days: f64) -> Result<Self> {
        write_preamble(&mut out, epoch_jd, duration_days)?;
        writeln!(out, "Time[s],X[km],Y[km],Z[km],VX[km/s],VY[km/s],VZ[km/s]")?;
        Ok(Self { out })
    }

    pub fn write_step(&mut self, step: &MissionStep) -> Result<()> {
        write!(self.out, "{:.*}", PRECISION, step.time_s)?;
        for value in step.state.to_array() {
            write!(self.out, ",{:.*}", PRECISION, value)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Access matrix: one column per grid point, rows only for steps that see
/// something. Visible cells hold `1`, the rest are empty.
pub struct AccessWriter<W: Write> {
    out: W,
    num_points: usize,
}

impl AccessWriter<BufWriter<File>> {
    pub fn create(
        path: impl AsRef<Path>,
        epoch_jd: f64,
        duration_days: f64,
        num_points: usize,
    ) -> Result<Self> {
        info!("Writing access matrix to {:?}", path.as_ref());
        Self::new(
            BufWriter::new(File::create(path)?),
            epoch_jd,
            duration_days,
            num_points,
        )
    }
}

impl<W: Write> AccessWriter<W> {
    pub fn new(mut out: W, epoch_jd: f64, duration_days: f64, num_points: usize) -> Result<Self> {
        write_preamble(&mut out, epoch_jd, duration_days)?;
        let columns: Vec<String> = (0..num_points).map(|i| format!("GP{}", i)).collect();
        writeln!(out, "Time[s],{}", columns.join(","))?;
        Ok(Self { out, num_points })
    }

    pub fn write_step(&mut self, step: &MissionStep) -> Result<()> {
        if step.visible.is_empty() {
            return Ok(());
        }
        write!(self.out, "{:.*}", PRECISION, step.time_s)?;
        let mut visible = step.visible.iter().peekable();
        for i in 0..self.num_points {
            if visible.next_if_eq(&&i).is_some() {
                write!(self.out, ",1")?;
            } else {
                write!(self.out, ",")?;
            }
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// GeoJSON trace of the projected sensor boundary, one feature per step.
#[derive(Debug, Default)]
pub struct FootprintTrace {
    features: Vec<serde_json::Value>,
}

impl FootprintTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: &MissionStep) {
        let coordinates: Vec<[f64; 2]> = step
            .footprint
            .iter()
            .filter_map(ProjectedPoint::ground)
            .map(|p| [p.longitude.to_degrees(), p.latitude.to_degrees()])
            .collect();
        if coordinates.len() < 2 {
            return;
        }
        self.features.push(serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates
            },
            "properties": {
                "step": step.index,
                "time_s": step.time_s,
                "headings": step.footprint.len(),
                "missed": step.footprint.len() - coordinates.len()
            }
        }));
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn to_geojson(&self, summary: &MissionSummary) -> serde_json::Value {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": self.features,
            "metadata": summary
        })
    }
}

pub fn write_json<T: serde::Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    info!("Writing {:?}", path);
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
