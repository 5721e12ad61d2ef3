//! Orbit Propagation and Coverage CLI
//!
//! Usage:
//!   orbit-propcov mission.json
//!   orbit-propcov mission.json --states out/states.csv --access out/access.csv \
//!                 --summary out/summary.json --footprint out/footprint.geojson --yaw180

use anyhow::{Context, Result};
use clap::Parser;
use propcov_cli::report::{self, AccessWriter, FootprintTrace, StateWriter};
use propcov_cli::{grid_file, MissionConfig, MissionRun};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "orbit-propcov",
    about = "Propagate a satellite and record sensor access to a coverage grid"
)]
struct Args {
    /// Mission configuration JSON file
    config: PathBuf,

    /// Coverage grid CSV (overrides the configuration)
    #[arg(short, long)]
    grid: Option<PathBuf>,

    /// Satellite state output CSV
    #[arg(long)]
    states: Option<PathBuf>,

    /// Access matrix output CSV
    #[arg(long)]
    access: Option<PathBuf>,

    /// Run summary JSON
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Sensor footprint trace GeoJSON
    #[arg(long)]
    footprint: Option<PathBuf>,

    /// Propagation step size in seconds
    #[arg(long)]
    step_size: Option<f64>,

    /// Mission duration in days
    #[arg(long)]
    duration_days: Option<f64>,

    /// Also check coverage with the spacecraft yawed 180 degrees
    #[arg(long)]
    yaw180: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut MissionConfig) {
        if let Some(grid) = &self.grid {
            config.grid_file = grid.clone();
        }
        if let Some(states) = &self.states {
            config.outputs.states = states.clone();
        }
        if let Some(access) = &self.access {
            config.outputs.access = access.clone();
        }
        if self.summary.is_some() {
            config.outputs.summary = self.summary.clone();
        }
        if self.footprint.is_some() {
            config.outputs.footprint = self.footprint.clone();
        }
        if let Some(step) = self.step_size {
            config.step_size_s = step;
        }
        if let Some(days) = self.duration_days {
            config.duration_days = days;
        }
        config.yaw180 |= self.yaw180;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("{}", "=".repeat(60));
    info!("Orbit Propagation and Coverage");
    info!("{}", "=".repeat(60));

    let mut config = MissionConfig::load(&args.config)
        .with_context(|| format!("loading mission configuration {:?}", args.config))?;
    args.apply(&mut config);
    config.validate()?;

    let grid = grid_file::load_grid(&config.grid_file)
        .with_context(|| format!("loading coverage grid {:?}", config.grid_file))?;
    info!("Central body: {}", config.body.name);
    let run = MissionRun::from_config(&config, &config.body, &grid)?;

    let mut states = StateWriter::create(&config.outputs.states, run.epoch_jd(), config.duration_days)?;
    let mut access = AccessWriter::create(
        &config.outputs.access,
        run.epoch_jd(),
        config.duration_days,
        grid.points().len(),
    )?;
    let mut trace = FootprintTrace::new();

    let summary = run.run(|step| {
        states.write_step(step)?;
        access.write_step(step)?;
        if config.outputs.footprint.is_some() {
            trace.push(step);
        }
        Ok(())
    })?;
    states.finish()?;
    access.finish()?;

    if let Some(path) = &config.outputs.summary {
        report::write_json(path, &summary)?;
    }
    if let Some(path) = &config.outputs.footprint {
        report::write_json(path, &trace.to_geojson(&summary))?;
    }

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Steps evaluated: {}", summary.steps);
    info!("Steps with access: {}", summary.access_rows);
    info!(
        "Grid points accessed: {} of {}",
        summary.points_accessed, summary.grid_points
    );
    info!("Wall time: {:.3} s", summary.wall_seconds);

    Ok(())
}
