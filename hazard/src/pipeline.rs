//! Batch drivers.
//!
//! Every input file gets an explicit [`Outcome`]. Failures reading,
//! aligning, clipping or writing one file are recorded and the batch
//! carries on; failures that invalidate the whole batch (normalization
//! range, series aggregation) are returned as errors.

use crate::{
    align::{AlignConfig, GridAligner},
    clip::{BoundaryClipper, ClipConfig, Coverage},
    eta::{EtaConfig, RiskSeriesAggregator},
    forcing::ForcingGrid,
    normalize::{NormalizationRange, Normalizer},
    series::load_series,
    stats::GridSummary,
    HazardError,
};
use log::{info, warn};
use raster::{Compression, Grid, RasterStore, SpatialMetadata, TimeIndex, EXTENSION};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    ffi::OsStr,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Where and how outputs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    out_dir: PathBuf,
    compression: Compression,
    /// Replace outputs that already exist instead of skipping them.
    overwrite: bool,
}

impl OutputConfig {
    pub fn new<P: Into<PathBuf>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.into(),
            compression: Compression::default(),
            overwrite: false,
        }
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Returns this configuration writing into `out_dir/name`.
    #[must_use]
    pub fn in_subdir(mut self, name: &str) -> Self {
        self.out_dir.push(name);
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Returns the output path for a grid named `stem`.
    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.out_dir.join(format!("{stem}.{EXTENSION}"))
    }

    /// Returns the output path mirroring `input`'s file name.
    fn path_mirroring(&self, input: &Path) -> Result<PathBuf, HazardError> {
        input
            .file_stem()
            .and_then(OsStr::to_str)
            .map(|stem| self.path_for(stem))
            .ok_or_else(|| HazardError::Configuration(format!("{input:?} has no file name")))
    }

    fn is_done(&self, dest: &Path) -> bool {
        !self.overwrite && dest.exists()
    }

    fn write(&self, store: &RasterStore, dest: &Path, grid: &Grid) -> Result<(), HazardError> {
        store.write(dest, grid, &SpatialMetadata::of(grid, self.compression))?;
        Ok(())
    }

    fn prepare(&self) -> Result<(), HazardError> {
        fs::create_dir_all(&self.out_dir)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Written {
        output: PathBuf,
        #[serde(skip_serializing_if = "Option::is_none")]
        coverage: Option<Coverage>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl Outcome {
    fn written(output: PathBuf) -> Self {
        Self::Written {
            output,
            coverage: None,
        }
    }

    fn skipped(reason: &str) -> Self {
        Self::Skipped {
            reason: reason.to_owned(),
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl FileOutcome {
    fn new(input: &Path, outcome: Outcome) -> Self {
        match &outcome {
            Outcome::Failed { reason } => warn!("{input:?}: {reason}"),
            Outcome::Skipped { reason } => warn!("{input:?}: skipped, {reason}"),
            Outcome::Written { .. } => (),
        }
        Self {
            input: input.to_owned(),
            outcome,
        }
    }

    fn from_result(input: &Path, result: Result<Outcome, HazardError>) -> Self {
        let outcome = result.unwrap_or_else(|e| Outcome::Failed {
            reason: e.to_string(),
        });
        Self::new(input, outcome)
    }
}

/// Per-file outcomes of one batch stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub stage: &'static str,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<NormalizationRange>,
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    fn new(stage: &'static str, files: Vec<FileOutcome>, range: Option<NormalizationRange>) -> Self {
        let count = |f: fn(&Outcome) -> bool| files.iter().filter(|o| f(&o.outcome)).count();
        let written = count(|o| matches!(o, Outcome::Written { .. }));
        let skipped = count(|o| matches!(o, Outcome::Skipped { .. }));
        let failed = count(|o| matches!(o, Outcome::Failed { .. }));
        info!("{stage}: {written} written, {skipped} skipped, {failed} failed");
        Self {
            stage,
            written,
            skipped,
            failed,
            range,
            files,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtaReport {
    pub times: Vec<TimeIndex>,
    pub threshold: f32,
    pub unset_value: f32,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<GridSummary>,
}

/// Returns the `.rgrd` files in `dir` whose names start with
/// `prefix`, sorted by name.
pub fn discover_inputs<P: AsRef<Path>>(dir: P, prefix: &str) -> Result<Vec<PathBuf>, HazardError> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HazardError::NoInput(Some(dir.to_owned())))
        }
        Err(e) => return Err(e.into()),
    };
    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path.is_file()
            && path.extension() == Some(OsStr::new(EXTENSION))
            && path
                .file_name()
                .and_then(OsStr::to_str)
                .map_or(false, |name| name.starts_with(prefix));
        if matches {
            inputs.push(path);
        }
    }
    if inputs.is_empty() {
        return Err(HazardError::NoInput(Some(dir.to_owned())));
    }
    inputs.sort();
    Ok(inputs)
}

/// Reprojects and resamples every input into `output`.
pub fn align_files(
    store: &RasterStore,
    config: &AlignConfig,
    inputs: &[PathBuf],
    output: &OutputConfig,
) -> Result<BatchReport, HazardError> {
    if inputs.is_empty() {
        return Err(HazardError::NoInput(None));
    }
    output.prepare()?;
    let aligner = GridAligner::new(*config);
    let files = inputs
        .par_iter()
        .map(|input| FileOutcome::from_result(input, align_one(store, &aligner, input, output)))
        .collect();
    Ok(BatchReport::new("align", files, None))
}

fn align_one(
    store: &RasterStore,
    aligner: &GridAligner,
    input: &Path,
    output: &OutputConfig,
) -> Result<Outcome, HazardError> {
    let dest = output.path_mirroring(input)?;
    if output.is_done(&dest) {
        return Ok(Outcome::skipped("output exists"));
    }
    let (grid, _) = store.read(input)?;
    let aligned = aligner.align(&grid)?;
    output.write(store, &dest, &aligned)?;
    Ok(Outcome::written(dest))
}

/// Aligns, normalizes over the whole batch, optionally clips, and
/// writes soil-wetness grids.
///
/// Every aligned grid contributes to the normalization range, including
/// ones whose outputs already exist and will not be rewritten.
pub fn wetness_pipeline(
    store: &RasterStore,
    align: &AlignConfig,
    clip: Option<&ClipConfig>,
    inputs: &[PathBuf],
    output: &OutputConfig,
) -> Result<BatchReport, HazardError> {
    if inputs.is_empty() {
        return Err(HazardError::NoInput(None));
    }
    output.prepare()?;
    let aligner = GridAligner::new(*align);

    let aligned: Vec<(&PathBuf, Result<Grid, HazardError>)> = inputs
        .par_iter()
        .map(|input| {
            let result = store
                .read(input)
                .map_err(HazardError::from)
                .and_then(|(grid, _)| aligner.align(&grid));
            (input, result)
        })
        .collect();

    let mut files = Vec::new();
    let mut survivors = Vec::new();
    let mut grids = Vec::new();
    for (input, result) in aligned {
        match result {
            Ok(grid) => {
                survivors.push(input);
                grids.push(grid);
            }
            Err(e) => files.push(FileOutcome::from_result(input, Err(e))),
        }
    }
    if grids.is_empty() {
        return Err(HazardError::NoInput(None));
    }

    let range = Normalizer::compute_range(&grids)?;
    info!(
        "wetness range over {} grids: ({}, {})",
        grids.len(),
        range.min(),
        range.max()
    );

    let clipper = clip.cloned().map(BoundaryClipper::new);
    let finished: Vec<FileOutcome> = survivors
        .par_iter()
        .zip(grids.par_iter())
        .map(|(input, grid)| {
            let result = finish_wetness(store, grid, range, clipper.as_ref(), input, output);
            FileOutcome::from_result(input, result)
        })
        .collect();
    files.extend(finished);
    files.sort_by(|a, b| a.input.cmp(&b.input));
    Ok(BatchReport::new("wetness", files, Some(range)))
}

fn finish_wetness(
    store: &RasterStore,
    aligned: &Grid,
    range: NormalizationRange,
    clipper: Option<&BoundaryClipper>,
    input: &Path,
    output: &OutputConfig,
) -> Result<Outcome, HazardError> {
    let dest = output.path_mirroring(input)?;
    if output.is_done(&dest) {
        return Ok(Outcome::skipped("output exists"));
    }
    let scaled = Normalizer::scale(aligned, range);
    let (grid, coverage) = match clipper {
        None => (scaled, None),
        Some(clipper) => {
            let clipped = clipper.clip(&scaled)?;
            if clipped.valid_after == 0 {
                return Ok(Outcome::skipped("no valid data after clipping"));
            }
            let coverage = clipped.coverage();
            (clipped.grid, Some(coverage))
        }
    };
    output.write(store, &dest, &grid)?;
    Ok(Outcome::Written {
        output: dest,
        coverage,
    })
}

/// Clips every input to the configured boundary.
pub fn clip_files(
    store: &RasterStore,
    clip: &ClipConfig,
    inputs: &[PathBuf],
    output: &OutputConfig,
) -> Result<BatchReport, HazardError> {
    if inputs.is_empty() {
        return Err(HazardError::NoInput(None));
    }
    output.prepare()?;
    let clipper = BoundaryClipper::new(clip.clone());
    let files = inputs
        .par_iter()
        .map(|input| FileOutcome::from_result(input, clip_one(store, &clipper, input, output)))
        .collect();
    Ok(BatchReport::new("clip", files, None))
}

fn clip_one(
    store: &RasterStore,
    clipper: &BoundaryClipper,
    input: &Path,
    output: &OutputConfig,
) -> Result<Outcome, HazardError> {
    let dest = output.path_mirroring(input)?;
    if output.is_done(&dest) {
        return Ok(Outcome::skipped("output exists"));
    }
    let (grid, _) = store.read(input)?;
    let clipped = clipper.clip(&grid)?;
    if clipped.valid_after == 0 {
        return Ok(Outcome::skipped("no valid data after clipping"));
    }
    output.write(store, &dest, &clipped.grid)?;
    Ok(Outcome::Written {
        output: dest,
        coverage: Some(clipped.coverage()),
    })
}

/// Loads the risk series in `inputs`, computes arrival times, and
/// writes them as `name` in the output directory.
pub fn eta_pipeline(
    store: &RasterStore,
    config: &EtaConfig,
    inputs: &[PathBuf],
    output: &OutputConfig,
    name: &str,
) -> Result<EtaReport, HazardError> {
    if inputs.is_empty() {
        return Err(HazardError::NoInput(None));
    }
    let series = load_series(store, inputs)?;
    let times = series.iter().map(|s| s.time).collect();
    let mut report = EtaReport {
        times,
        threshold: config.threshold(),
        unset_value: config.unset_value(),
        outcome: Outcome::skipped("output exists"),
        summary: None,
    };
    let dest = output.path_for(name);
    if output.is_done(&dest) {
        warn!("{dest:?}: skipped, output exists");
        return Ok(report);
    }

    let eta = RiskSeriesAggregator::new(*config).compute_eta(&series)?;
    output.prepare()?;
    output.write(store, &dest, &eta)?;
    let summary = GridSummary::of(&eta);
    info!(
        "eta written to {dest:?}, times {:?}",
        summary.distinct.as_deref().unwrap_or_default()
    );
    report.outcome = Outcome::written(dest);
    report.summary = Some(summary);
    Ok(report)
}

/// Writes named forcing grids into the output directory.
pub fn write_forcing(
    store: &RasterStore,
    grids: &[ForcingGrid],
    output: &OutputConfig,
) -> Result<BatchReport, HazardError> {
    if grids.is_empty() {
        return Err(HazardError::NoInput(None));
    }
    output.prepare()?;
    let files = grids
        .par_iter()
        .map(|forcing| {
            let dest = output.path_for(&forcing.name);
            let result = if output.is_done(&dest) {
                Ok(Outcome::skipped("output exists"))
            } else {
                output
                    .write(store, &dest, &forcing.grid.grid)
                    .map(|()| Outcome::written(dest))
            };
            FileOutcome::from_result(Path::new(&forcing.name), result)
        })
        .collect();
    Ok(BatchReport::new("forcing", files, None))
}

#[cfg(test)]
mod tests {
    use super::{
        align_files, clip_files, discover_inputs, eta_pipeline, wetness_pipeline, write_forcing,
        Outcome, OutputConfig,
    };
    use crate::{
        align::AlignConfig, boundary::BoundaryGeometry, clip::ClipConfig, eta::EtaConfig,
        forcing::synthetic_storm, HazardError,
    };
    use chrono::NaiveDate;
    use geo::{geometry::MultiPolygon, polygon};
    use raster::{Crs, GeoTransform, Grid, RasterStore};
    use std::{fs, path::Path};

    const UTM: Crs = Crs::from_epsg(26918);

    fn grid(rows: usize, cols: usize, data: Vec<f32>) -> Grid {
        Grid::new(
            data,
            rows,
            cols,
            GeoTransform::from_origin(580_000.0, 4_520_000.0, 10.0, 10.0),
            UTM,
            -9999.0,
        )
        .unwrap()
    }

    fn save(dir: &Path, name: &str, grid: &Grid) -> std::path::PathBuf {
        let path = dir.join(name);
        RasterStore::default().save(&path, grid).unwrap();
        path
    }

    #[test]
    fn test_discover_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let g = grid(1, 1, vec![0.0]);
        save(dir.path(), "wf_20260206_13.rgrd", &g);
        save(dir.path(), "wf_20260206_12.rgrd", &g);
        save(dir.path(), "rain_20260206_12.rgrd", &g);
        fs::write(dir.path().join("wf_notes.txt"), "").unwrap();

        let found = discover_inputs(dir.path(), "wf_").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["wf_20260206_12.rgrd", "wf_20260206_13.rgrd"]);

        assert!(matches!(
            discover_inputs(dir.path(), "dyn_"),
            Err(HazardError::NoInput(Some(_)))
        ));
        assert!(matches!(
            discover_inputs(dir.path().join("missing"), ""),
            Err(HazardError::NoInput(Some(_)))
        ));
    }

    #[test]
    fn test_align_isolates_bad_files() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = save(input.path(), "wf_12.rgrd", &grid(4, 4, vec![0.5; 16]));
        let bad = input.path().join("wf_13.rgrd");
        fs::write(&bad, b"garbage").unwrap();
        let missing = input.path().join("wf_14.rgrd");
        // Valid header claiming u32::MAX rows and columns.
        let mut bytes = fs::read(&good).unwrap();
        bytes[8..16].fill(0xff);
        let oversized = input.path().join("wf_15.rgrd");
        fs::write(&oversized, bytes).unwrap();

        let store = RasterStore::default();
        let config = AlignConfig::new(UTM, 20.0).unwrap();
        let output = OutputConfig::new(out.path());
        let inputs = vec![good, bad, missing, oversized];
        let report = align_files(&store, &config, &inputs, &output).unwrap();
        assert_eq!((report.written, report.skipped, report.failed), (1, 0, 3));
        assert_eq!(report.files.len(), 4);

        let (aligned, _) = store.read(out.path().join("wf_12.rgrd")).unwrap();
        assert_eq!(aligned.shape(), (2, 2));

        // Existing outputs are left alone on a rerun.
        let again = align_files(&store, &config, &inputs[..1], &output).unwrap();
        assert_eq!(again.skipped, 1);
        let forced = align_files(&store, &config, &inputs[..1], &output.clone().with_overwrite(true))
            .unwrap();
        assert_eq!(forced.written, 1);

        assert!(matches!(
            align_files(&store, &config, &[], &output),
            Err(HazardError::NoInput(None))
        ));
    }

    #[test]
    fn test_wetness_normalizes_across_batch() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(input.path(), "wf_20260206_01.rgrd", &grid(2, 2, vec![0.2, 0.3, -9999.0, 0.3])),
            save(input.path(), "wf_20260206_02.rgrd", &grid(2, 2, vec![0.4, 0.6, 0.5, 0.3])),
        ];
        let store = RasterStore::default();
        let config = AlignConfig::new(UTM, 10.0).unwrap();
        let report =
            wetness_pipeline(&store, &config, None, &inputs, &OutputConfig::new(out.path())).unwrap();
        assert_eq!(report.written, 2);
        let range = report.range.unwrap();
        assert!((range.min() - 0.2).abs() < 1e-6);
        assert!((range.max() - 0.6).abs() < 1e-6);

        let (first, _) = store.read(out.path().join("wf_20260206_01.rgrd")).unwrap();
        let (second, _) = store.read(out.path().join("wf_20260206_02.rgrd")).unwrap();
        assert!(first.get(0, 0).unwrap().abs() < 1e-5);
        assert_eq!(first.get(1, 0), Some(-9999.0));
        assert!((second.get(0, 1).unwrap() - 1.0).abs() < 1e-5);
        assert!(first
            .valid_values()
            .chain(second.valid_values())
            .all(|v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_wetness_with_clip_and_failures() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let bad = input.path().join("wf_03.rgrd");
        fs::write(&bad, b"RGRD").unwrap();
        let inputs = vec![
            save(input.path(), "wf_01.rgrd", &grid(4, 4, (0..16).map(|i| i as f32).collect())),
            bad,
        ];
        // Upper-left 2x2 pixels.
        let square = polygon![
            (x: 580_000.0, y: 4_519_980.0),
            (x: 580_020.0, y: 4_519_980.0),
            (x: 580_020.0, y: 4_520_000.0),
            (x: 580_000.0, y: 4_520_000.0)
        ];
        let boundary = BoundaryGeometry::new(MultiPolygon::new(vec![square]), UTM).unwrap();
        let clip = ClipConfig::new(boundary, 0.0);
        let store = RasterStore::default();
        let config = AlignConfig::new(UTM, 10.0).unwrap();
        let report = wetness_pipeline(
            &store,
            &config,
            Some(&clip),
            &inputs,
            &OutputConfig::new(out.path()),
        )
        .unwrap();
        assert_eq!((report.written, report.failed), (1, 1));
        match &report.files[0].outcome {
            Outcome::Written {
                coverage: Some(coverage),
                ..
            } => {
                assert_eq!((coverage.rows, coverage.cols), (2, 2));
                assert_eq!(coverage.valid_before, 16);
                // The minimum scales to 0, which is also the fill value.
                assert_eq!(coverage.valid_after, 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert!(matches!(
            wetness_pipeline(&store, &config, None, &inputs[1..], &OutputConfig::new(out.path())),
            Err(HazardError::NoInput(None))
        ));
    }

    #[test]
    fn test_degenerate_wetness_range_is_fatal() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(input.path(), "wf_01.rgrd", &grid(2, 2, vec![0.6; 4])),
            save(input.path(), "wf_02.rgrd", &grid(2, 2, vec![0.6; 4])),
        ];
        let config = AlignConfig::new(UTM, 10.0).unwrap();
        let result = wetness_pipeline(
            &RasterStore::default(),
            &config,
            None,
            &inputs,
            &OutputConfig::new(out.path()),
        );
        assert!(matches!(result, Err(HazardError::DataRange(_))));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_clip_skips_empty_results() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inputs = vec![save(input.path(), "wf_01.rgrd", &grid(3, 3, vec![0.5; 9]))];
        let far = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0)];
        let clip = ClipConfig::new(
            BoundaryGeometry::new(MultiPolygon::new(vec![far]), UTM).unwrap(),
            0.0,
        );
        let report =
            clip_files(&RasterStore::default(), &clip, &inputs, &OutputConfig::new(out.path()))
                .unwrap();
        assert_eq!(report.skipped, 1);
        assert!(!out.path().join("wf_01.rgrd").exists());
    }

    #[test]
    fn test_eta_pipeline() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(input.path(), "dyn_14.rgrd", &grid(2, 2, vec![1.0, 1.0, 0.0, 0.0])),
            save(input.path(), "dyn_12.rgrd", &grid(2, 2, vec![0.0, 0.0, 0.0, 0.0])),
            save(input.path(), "dyn_13.rgrd", &grid(2, 2, vec![1.0, 0.0, 0.0, 0.0])),
        ];
        let store = RasterStore::default();
        let config = EtaConfig::new(0.5, 0.0).unwrap();
        let output = OutputConfig::new(out.path());
        let report = eta_pipeline(&store, &config, &inputs, &output, "eta_map").unwrap();
        assert_eq!(report.times, [12, 13, 14]);
        assert!(report.outcome.is_written());
        assert_eq!(report.summary.unwrap().distinct, Some(vec![13.0, 14.0]));

        let (eta, _) = store.read(out.path().join("eta_map.rgrd")).unwrap();
        assert_eq!(eta.data(), &[13.0, 14.0, 0.0, 0.0]);

        let again = eta_pipeline(&store, &config, &inputs, &output, "eta_map").unwrap();
        assert!(matches!(again.outcome, Outcome::Skipped { .. }));
    }

    #[test]
    fn test_eta_pipeline_rejects_mixed_geometry() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(input.path(), "dyn_12.rgrd", &grid(2, 2, vec![0.0; 4])),
            save(input.path(), "dyn_13.rgrd", &grid(1, 4, vec![0.0; 4])),
        ];
        let result = eta_pipeline(
            &RasterStore::default(),
            &EtaConfig::new(0.5, 0.0).unwrap(),
            &inputs,
            &OutputConfig::new(out.path()),
            "eta_map",
        );
        assert!(matches!(result, Err(HazardError::ShapeMismatch { index: 1 })));
        assert!(!out.path().join("eta_map.rgrd").exists());
    }

    #[test]
    fn test_write_forcing() {
        let out = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        let storm = synthetic_storm(&grid(2, 2, vec![0.0; 4]), date, &[(12, 20.0), (13, 30.0)], 0.6)
            .unwrap();
        let output = OutputConfig::new(out.path().join("rainfall"));
        let report = write_forcing(&RasterStore::default(), &storm.rainfall, &output).unwrap();
        assert_eq!(report.written, 2);
        let inputs = discover_inputs(output.out_dir(), "rain_").unwrap();
        assert_eq!(inputs.len(), 2);
        assert!(inputs[0].ends_with("rain_20260206_12.rgrd"));
    }

    #[test]
    fn test_path_for_keeps_dotted_stems() {
        let output = OutputConfig::new("out");
        assert_eq!(output.path_for("dyn.v2_12"), Path::new("out/dyn.v2_12.rgrd"));
        assert_ne!(output.path_for("dyn.v2_12"), output.path_for("dyn.v3_12"));
        assert_eq!(output.path_for("eta_map"), Path::new("out/eta_map.rgrd"));
    }

    #[test]
    fn test_unusable_resolution_fails_per_file() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = save(input.path(), "wf_12.rgrd", &grid(2, 2, vec![0.5; 4]));
        let config = AlignConfig::new(UTM, 1e-9).unwrap();
        let report = align_files(
            &RasterStore::default(),
            &config,
            &[path],
            &OutputConfig::new(out.path()),
        )
        .unwrap();
        assert_eq!((report.written, report.failed), (0, 1));
    }
}
