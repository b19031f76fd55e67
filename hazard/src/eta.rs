//! First-exceedance arrival times over a risk series.

use crate::HazardError;
use log::debug;
use raster::{Grid, TimeIndex, TimestampedGrid};
use rayon::prelude::*;

/// Rows handed to each worker. Time order is sequential within a
/// block; blocks are independent.
const ROWS_PER_BLOCK: usize = 64;

/// Largest time index an `f32` output sample holds exactly.
pub const MAX_TIME_INDEX: TimeIndex = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtaConfig {
    /// Risk value at or above which a pixel is considered exceeded.
    threshold: f32,
    /// Value of pixels that never exceed; also the output's nodata.
    unset_value: f32,
}

impl EtaConfig {
    pub fn new(threshold: f32, unset_value: f32) -> Result<Self, HazardError> {
        if !threshold.is_finite() {
            return Err(HazardError::Configuration(format!(
                "threshold must be finite, got {threshold}"
            )));
        }
        Ok(Self {
            threshold,
            unset_value,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn unset_value(&self) -> f32 {
        self.unset_value
    }
}

/// Folds an ordered risk series into a single arrival-time grid.
///
/// Each pixel takes the time index of the first snapshot whose valid
/// value is at or above the threshold. Once set, later snapshots do
/// not change it.
#[derive(Debug, Clone, Copy)]
pub struct RiskSeriesAggregator {
    config: EtaConfig,
}

impl RiskSeriesAggregator {
    pub fn new(config: EtaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtaConfig {
        &self.config
    }

    /// Returns the arrival-time grid for `series`.
    ///
    /// The whole series is validated before any pixel is touched: it
    /// must be non-empty, strictly increasing in time with no index
    /// above [`MAX_TIME_INDEX`], and every grid must share the first
    /// grid's shape, transform and CRS.
    pub fn compute_eta(&self, series: &[TimestampedGrid]) -> Result<Grid, HazardError> {
        let first = validate(series)?;
        let EtaConfig {
            threshold,
            unset_value,
        } = self.config;
        let cols = first.cols().max(1);
        let mut eta = vec![unset_value; first.len()];

        eta.par_chunks_mut(cols * ROWS_PER_BLOCK)
            .enumerate()
            .for_each(|(block, out)| {
                let offset = block * cols * ROWS_PER_BLOCK;
                let mut set = vec![false; out.len()];
                let mut remaining = out.len();
                for snapshot in series {
                    if remaining == 0 {
                        break;
                    }
                    #[allow(clippy::cast_precision_loss)]
                    let time = snapshot.time as f32;
                    let grid = &snapshot.grid;
                    let values = &grid.data()[offset..offset + out.len()];
                    for ((o, s), v) in out.iter_mut().zip(set.iter_mut()).zip(values) {
                        if !*s && !grid.is_nodata(*v) && *v >= threshold {
                            *o = time;
                            *s = true;
                            remaining -= 1;
                        }
                    }
                }
            });

        let eta = first.with_data(eta)?.with_nodata(unset_value);
        debug!(
            "eta over {} snapshots: {} of {} pixels exceeded {threshold}",
            series.len(),
            eta.valid_count(),
            eta.len()
        );
        Ok(eta)
    }
}

/// Computes arrival times for `series` with the given threshold.
pub fn compute_eta(
    series: &[TimestampedGrid],
    threshold: f32,
    unset_value: f32,
) -> Result<Grid, HazardError> {
    RiskSeriesAggregator::new(EtaConfig::new(threshold, unset_value)?).compute_eta(series)
}

fn validate(series: &[TimestampedGrid]) -> Result<&Grid, HazardError> {
    let first = series.first().ok_or(HazardError::EmptySeries)?;
    if let Some(late) = series.iter().find(|s| s.time > MAX_TIME_INDEX) {
        return Err(HazardError::Configuration(format!(
            "time index {} exceeds {MAX_TIME_INDEX}",
            late.time
        )));
    }
    for (index, pair) in series.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if !current.grid.same_geometry(&first.grid) {
            return Err(HazardError::ShapeMismatch { index: index + 1 });
        }
        if current.time <= previous.time {
            return Err(HazardError::UnorderedSeries {
                previous: previous.time,
                current: current.time,
            });
        }
    }
    Ok(&first.grid)
}
