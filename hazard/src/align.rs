//! Reprojection and resampling onto a common grid.

use crate::{projection::Reprojector, HazardError};
use log::debug;
use raster::{Crs, GeoTransform, Grid, C};

/// Fractional pixel positions this close to a whole pixel are snapped
/// to it so that aligning a grid onto itself reproduces it exactly.
const SNAP: C = 1e-9;

/// Largest target grid, in pixels, that alignment will allocate.
pub const MAX_TARGET_PIXELS: usize = 1 << 30;

/// Target CRS and resolution for alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignConfig {
    target_crs: Crs,
    /// Pixel size in target CRS units, applied to both axes.
    resolution: C,
}

impl AlignConfig {
    pub fn new(target_crs: Crs, resolution: C) -> Result<Self, HazardError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(HazardError::Configuration(format!(
                "resolution must be positive, got {resolution}"
            )));
        }
        Ok(Self {
            target_crs,
            resolution,
        })
    }

    pub fn target_crs(&self) -> Crs {
        self.target_crs
    }

    pub fn resolution(&self) -> C {
        self.resolution
    }
}

/// Destination geometry computed for a source grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetGeometry {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
}

/// Resamples grids into a target CRS and resolution.
#[derive(Debug, Clone, Copy)]
pub struct GridAligner {
    config: AlignConfig,
}

impl GridAligner {
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Returns the north-up transform and shape that cover `source`'s
    /// extent in the target CRS at the target resolution.
    pub fn default_transform(
        &self,
        source: &Grid,
        to_target: &Reprojector,
    ) -> Result<TargetGeometry, HazardError> {
        let res = self.config.resolution;
        let extent = to_target.transform_bounds(source.bounds())?;
        let (min, max) = (extent.min(), extent.max());
        let cols = whole_pixels((max.x - min.x) / res)?;
        let rows = whole_pixels((max.y - min.y) / res)?;
        if rows.checked_mul(cols).map_or(true, |n| n > MAX_TARGET_PIXELS) {
            return Err(HazardError::Configuration(format!(
                "resolution {res} yields a {rows}x{cols} target grid"
            )));
        }
        Ok(TargetGeometry {
            transform: GeoTransform::from_origin(min.x, max.y, res, res),
            rows,
            cols,
        })
    }

    /// Returns `source` resampled onto the target CRS and resolution
    /// with bilinear interpolation.
    pub fn align(&self, source: &Grid) -> Result<Grid, HazardError> {
        let to_target = Reprojector::new(source.crs(), self.config.target_crs)?;
        let to_source = to_target.inverse()?;
        let geometry = self.default_transform(source, &to_target)?;
        let src_inverse = source.transform().inverse().ok_or_else(|| {
            HazardError::Configuration(format!(
                "source transform {:?} is not invertible",
                source.transform()
            ))
        })?;
        debug!(
            "aligning {}x{} {} -> {}x{} {} at {}",
            source.rows(),
            source.cols(),
            source.crs(),
            geometry.rows,
            geometry.cols,
            self.config.target_crs,
            self.config.resolution
        );

        let nodata = source.nodata();
        let mut data = Vec::with_capacity(geometry.rows * geometry.cols);
        for row in 0..geometry.rows {
            for col in 0..geometry.cols {
                #[allow(clippy::cast_precision_loss)]
                let (x, y) = geometry
                    .transform
                    .apply(col as C + 0.5, row as C + 0.5);
                let sample = to_source
                    .transform(x, y)
                    .ok()
                    .and_then(|(sx, sy)| {
                        let (px, py) = src_inverse.apply(sx, sy);
                        bilinear(source, px, py)
                    })
                    .unwrap_or(nodata);
                data.push(sample);
            }
        }

        Ok(Grid::new(
            data,
            geometry.rows,
            geometry.cols,
            geometry.transform,
            self.config.target_crs,
            nodata,
        )?)
    }
}

/// Aligns `source` to `target_crs` at `resolution`.
pub fn align(source: &Grid, target_crs: Crs, resolution: C) -> Result<Grid, HazardError> {
    GridAligner::new(AlignConfig::new(target_crs, resolution)?).align(source)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_pixels(span: C) -> Result<usize, HazardError> {
    if !span.is_finite() || span < 0.0 {
        return Err(HazardError::Projection(format!(
            "degenerate target extent ({span} pixels)"
        )));
    }
    Ok(((span - SNAP).ceil() as usize).max(1))
}

fn snap(v: C) -> C {
    let r = v.round();
    if (v - r).abs() < SNAP {
        r
    } else {
        v
    }
}

/// Samples `grid` at fractional pixel position `(px, py)`, where
/// `(0, 0)` is the upper-left corner of the grid.
///
/// Returns `None` outside the grid or when every contributing
/// neighbor is nodata. Nodata neighbors drop out of the blend and the
/// remaining weights are renormalized.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn bilinear(grid: &Grid, px: C, py: C) -> Option<f32> {
    let (rows, cols) = grid.shape();
    if !(px >= 0.0 && py >= 0.0 && px <= cols as C && py <= rows as C) {
        return None;
    }
    let u = snap(px - 0.5);
    let v = snap(py - 0.5);
    let (x0, y0) = (u.floor(), v.floor());
    let (fx, fy) = (u - x0, v - y0);
    let clamp = |i: C, n: usize| (i.max(0.0) as usize).min(n - 1);
    let (c0, c1) = (clamp(x0, cols), clamp(x0 + 1.0, cols));
    let (r0, r1) = (clamp(y0, rows), clamp(y0 + 1.0, rows));

    let data = grid.data();
    let neighbors = [
        (data[r0 * cols + c0], (1.0 - fx) * (1.0 - fy)),
        (data[r0 * cols + c1], fx * (1.0 - fy)),
        (data[r1 * cols + c0], (1.0 - fx) * fy),
        (data[r1 * cols + c1], fx * fy),
    ];
    let (sum, weight) = neighbors
        .iter()
        .filter(|(value, w)| *w > 0.0 && !grid.is_nodata(*value))
        .fold((0.0, 0.0), |(sum, weight), (value, w)| {
            (sum + C::from(*value) * w, weight + w)
        });
    (weight > 0.0).then(|| (sum / weight) as f32)
}
