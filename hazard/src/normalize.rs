//! Batch-global min/max normalization.

use crate::HazardError;
use log::debug;
use raster::Grid;
use rayon::prelude::*;
use serde::Serialize;

/// Global `(min, max)` over the valid samples of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationRange {
    min: f32,
    max: f32,
}

impl NormalizationRange {
    /// Returns a range, failing unless both ends are finite and
    /// `min < max`.
    pub fn new(min: f32, max: f32) -> Result<Self, HazardError> {
        if !(min.is_finite() && max.is_finite()) {
            return Err(HazardError::DataRange(format!(
                "non-finite range ({min}, {max})"
            )));
        }
        if min >= max {
            return Err(HazardError::DataRange(format!(
                "min {min} is not below max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    /// The identity range; scaling an already normalized grid with it
    /// changes nothing.
    pub fn unit() -> Self {
        Self { min: 0.0, max: 1.0 }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    #[inline]
    fn scale_value(&self, v: f32) -> f32 {
        let (min, max) = (f64::from(self.min), f64::from(self.max));
        #[allow(clippy::cast_possible_truncation)]
        let scaled = ((f64::from(v) - min) / (max - min)).clamp(0.0, 1.0) as f32;
        scaled
    }
}

/// Two-phase normalizer: a reduction over the whole batch, then an
/// independent rescale of each grid.
pub struct Normalizer;

impl Normalizer {
    /// Returns the range spanned by every valid sample of every grid
    /// in `grids`.
    pub fn compute_range(grids: &[Grid]) -> Result<NormalizationRange, HazardError> {
        let extremes = grids
            .par_iter()
            .filter_map(Grid::min_max)
            .reduce_with(|(lo_a, hi_a), (lo_b, hi_b)| (lo_a.min(lo_b), hi_a.max(hi_b)));
        let (min, max) = extremes.ok_or_else(|| {
            HazardError::DataRange(format!("no valid samples in {} grids", grids.len()))
        })?;
        debug!("normalization range over {} grids: ({min}, {max})", grids.len());
        NormalizationRange::new(min, max)
    }

    /// Returns `grid` rescaled into `[0, 1]` by `range`. Nodata samples
    /// pass through unchanged.
    pub fn scale(grid: &Grid, range: NormalizationRange) -> Grid {
        grid.map_valid(|v| range.scale_value(v))
    }

    /// Computes the batch range then scales every grid with it.
    pub fn normalize(grids: &[Grid]) -> Result<(NormalizationRange, Vec<Grid>), HazardError> {
        let range = Self::compute_range(grids)?;
        let scaled = grids.par_iter().map(|g| Self::scale(g, range)).collect();
        Ok((range, scaled))
    }
}

#[cfg(test)]
mod tests {
    use super::{NormalizationRange, Normalizer};
    use crate::HazardError;
    use raster::{Crs, GeoTransform, Grid};

    fn grid(data: Vec<f32>) -> Grid {
        let n = data.len();
        Grid::new(
            data,
            1,
            n,
            GeoTransform::from_origin(0.0, 0.0, 1.0, 1.0),
            Crs::from_epsg(32618),
            -9999.0,
        )
        .unwrap()
    }

    #[test]
    fn test_range_spans_batch() {
        let grids = [
            grid(vec![0.3, -9999.0, 0.5]),
            grid(vec![f32::NAN, 0.1, 0.2]),
            grid(vec![-9999.0, 0.9, 0.4]),
        ];
        let range = Normalizer::compute_range(&grids).unwrap();
        assert_eq!(range, NormalizationRange::new(0.1, 0.9).unwrap());
    }

    #[test]
    fn test_scale_endpoints_and_nodata() {
        let grids = [grid(vec![2.0, 4.0, -9999.0]), grid(vec![6.0, f32::NAN, 3.0])];
        let (range, scaled) = Normalizer::normalize(&grids).unwrap();
        assert_eq!(range.min(), 2.0);
        assert_eq!(range.max(), 6.0);
        assert_eq!(scaled[0].data()[0], 0.0);
        assert_eq!(scaled[0].data()[1], 0.5);
        assert_eq!(scaled[0].data()[2], -9999.0);
        assert_eq!(scaled[1].data()[0], 1.0);
        assert!(scaled[1].data()[1].is_nan());
        assert_eq!(scaled[1].data()[2], 0.25);
        assert!(scaled.iter().all(|g| g.valid_values().all(|v| (0.0..=1.0).contains(&v))));
        assert!(scaled[0].same_geometry(&grids[0]));
    }

    #[test]
    fn test_scale_clamps_outside_range() {
        let range = NormalizationRange::new(0.0, 10.0).unwrap();
        let scaled = Normalizer::scale(&grid(vec![-5.0, 5.0, 15.0]), range);
        assert_eq!(scaled.data(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_unit_range_is_idempotent() {
        let (_, scaled) = Normalizer::normalize(&[grid(vec![1.0, 3.0, 2.0, -9999.0])]).unwrap();
        let again = Normalizer::scale(&scaled[0], NormalizationRange::unit());
        assert_eq!(again, scaled[0]);
    }

    #[test]
    fn test_degenerate_ranges() {
        let flat = [grid(vec![0.6, 0.6]), grid(vec![0.6, -9999.0])];
        assert!(matches!(
            Normalizer::compute_range(&flat),
            Err(HazardError::DataRange(_))
        ));
        let empty = [grid(vec![-9999.0, f32::NAN])];
        assert!(matches!(
            Normalizer::compute_range(&empty),
            Err(HazardError::DataRange(_))
        ));
        assert!(matches!(
            Normalizer::compute_range(&[]),
            Err(HazardError::DataRange(_))
        ));
    }
}
