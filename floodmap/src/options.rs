use anyhow::{anyhow, Error as AnyError};
use chrono::NaiveDate;
use clap::{Args, Parser};
use hazard::{
    pipeline::{discover_inputs, OutputConfig},
    HazardError,
};
use raster::{Compression, Crs, TimeIndex};
use std::{path::PathBuf, str::FromStr};

/// Align, normalize, clip and map flood hazard rasters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub enum Cli {
    /// Reproject and resample grids onto a common CRS and resolution.
    Align(Align),

    /// Align soil-wetness grids, normalize them over the whole batch,
    /// and optionally clip them to a boundary.
    Wetness(Wetness),

    /// Clip grids to a boundary polygon.
    Clip(Clip),

    /// Compute first-exceedance times from an hourly risk series.
    Eta(Eta),

    /// Print summaries of grids.
    Stats(Stats),

    /// Rasterize an hourly `time,precip_mm` table onto a template grid.
    ImportRain(ImportRain),

    /// Write constant rainfall and soil-wetness grids for a demo storm.
    Synth(Synth),
}

#[derive(Debug, Clone, Args)]
pub struct Inputs {
    /// Directory to search for inputs when none are listed.
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// File name prefix of inputs found in `--input-dir`.
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Input grids.
    pub input: Vec<PathBuf>,
}

impl Inputs {
    pub fn resolve(&self) -> Result<Vec<PathBuf>, HazardError> {
        match (&self.input_dir, self.input.is_empty()) {
            (_, false) => Ok(self.input.clone()),
            (Some(dir), true) => discover_inputs(dir, &self.prefix),
            (None, true) => Err(HazardError::NoInput(None)),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct Output {
    /// Output directory.
    #[arg(short, long)]
    pub out_dir: PathBuf,

    /// Reprocess inputs even if the corresponding output already
    /// exists.
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Amount of compression, 0 for none.
    #[arg(short, long, default_value_t = 6)]
    pub compression: u32,
}

impl Output {
    pub fn config(&self) -> OutputConfig {
        let compression = match self.compression {
            0 => Compression::None,
            level => Compression::Deflate(level),
        };
        OutputConfig::new(self.out_dir.clone())
            .with_compression(compression)
            .with_overwrite(self.overwrite)
    }
}

#[derive(Debug, Clone, Args)]
pub struct Align {
    /// Target CRS, e.g. `EPSG:26918`.
    #[arg(long, default_value = "EPSG:26918")]
    pub crs: Crs,

    /// Target pixel size in target CRS units.
    #[arg(short, long, default_value_t = 10.0)]
    pub resolution: f64,

    #[command(flatten)]
    pub output: Output,

    #[command(flatten)]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, Args)]
pub struct Wetness {
    #[command(flatten)]
    pub align: Align,

    /// GeoJSON boundary to clip normalized grids to.
    #[arg(short, long)]
    pub boundary: Option<PathBuf>,

    /// Value written outside the boundary.
    #[arg(long, default_value_t = 0.0)]
    pub fill: f32,
}

#[derive(Debug, Clone, Args)]
pub struct Clip {
    /// GeoJSON boundary.
    #[arg(short, long)]
    pub boundary: PathBuf,

    /// Value written outside the boundary.
    #[arg(long, default_value_t = 0.0)]
    pub fill: f32,

    #[command(flatten)]
    pub output: Output,

    #[command(flatten)]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, Args)]
pub struct Eta {
    /// Risk value at or above which a pixel is exceeded.
    #[arg(short, long, default_value_t = 0.4)]
    pub threshold: f32,

    /// Value of pixels that never exceed.
    #[arg(long, default_value_t = 0.0)]
    pub unset: f32,

    /// Output file stem.
    #[arg(long, default_value = "eta_map")]
    pub name: String,

    #[command(flatten)]
    pub output: Output,

    #[command(flatten)]
    pub inputs: Inputs,
}

#[derive(Debug, Clone, Args)]
pub struct Stats {
    /// Grids to summarize.
    #[arg(required = true)]
    pub input: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ImportRain {
    /// Grid whose geometry the rainfall grids copy.
    #[arg(short, long)]
    pub template: PathBuf,

    #[command(flatten)]
    pub output: Output,

    /// Hourly precipitation table.
    pub csv: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct Synth {
    /// Grid whose geometry the synthetic grids copy.
    #[arg(short, long)]
    pub template: PathBuf,

    /// Storm date, used in output names.
    #[arg(long, default_value = "2026-02-06")]
    pub date: NaiveDate,

    /// Rainfall per hour as "hour=mm".
    #[arg(long, value_delimiter = ',', default_value = "12=20,13=30,14=40")]
    pub storm: Vec<StormHour>,

    /// Uniform soil wetness.
    #[arg(long, default_value_t = 0.6)]
    pub soil: f32,

    #[command(flatten)]
    pub output: Output,
}

#[derive(Clone, Debug, Copy)]
pub struct StormHour(pub TimeIndex, pub f32);

impl FromStr for StormHour {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (hour, mm) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("not a valid hour=mm"))?;
        Ok(Self(hour.trim().parse()?, mm.trim().parse()?))
    }
}
