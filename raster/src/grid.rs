use crate::{Crs, GeoTransform, RasterError, C};
use geo::geometry::{Coord, Rect};
use std::{ffi::OsStr, path::Path};

/// Discrete time position of a grid within a series (e.g. hour of
/// day).
pub type TimeIndex = u32;

/// A single band of `f32` samples with its spatial reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// Row-major samples, `rows * cols` long.
    data: Vec<f32>,

    /// Number of (rows, columns) in this grid.
    dimensions: (usize, usize),

    /// Pixel to map transform.
    transform: GeoTransform,

    crs: Crs,

    /// Missing-sample sentinel.
    nodata: f32,
}

impl Grid {
    /// Returns a grid over `data`, failing if `data` is not exactly
    /// `rows * cols` long.
    pub fn new(
        data: Vec<f32>,
        rows: usize,
        cols: usize,
        transform: GeoTransform,
        crs: Crs,
        nodata: f32,
    ) -> Result<Self, RasterError> {
        if data.len() != rows * cols {
            return Err(RasterError::Shape {
                rows,
                cols,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            dimensions: (rows, cols),
            transform,
            crs,
            nodata,
        })
    }

    /// Returns a grid with every sample set to `value`.
    pub fn filled(
        rows: usize,
        cols: usize,
        value: f32,
        transform: GeoTransform,
        crs: Crs,
        nodata: f32,
    ) -> Self {
        Self {
            data: vec![value; rows * cols],
            dimensions: (rows, cols),
            transform,
            crs,
            nodata,
        }
    }

    /// Returns a grid with `other`'s geometry and every sample set to
    /// `value`.
    pub fn filled_like(other: &Self, value: f32) -> Self {
        let (rows, cols) = other.dimensions;
        Self::filled(rows, cols, value, other.transform, other.crs, other.nodata)
    }

    /// Returns a grid sharing `self`'s geometry and nodata sentinel
    /// over new samples.
    pub fn with_data(&self, data: Vec<f32>) -> Result<Self, RasterError> {
        let (rows, cols) = self.dimensions;
        Self::new(data, rows, cols, self.transform, self.crs, self.nodata)
    }

    /// Returns `self` with a different nodata sentinel. Samples are
    /// not rewritten.
    #[must_use]
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn rows(&self) -> usize {
        self.dimensions.0
    }

    pub fn cols(&self) -> usize {
        self.dimensions.1
    }

    /// Returns a grid with the same geometry whose valid samples are
    /// replaced by `f(sample)`. Nodata samples are copied unchanged.
    #[must_use]
    pub fn map_valid<F: Fn(f32) -> f32>(&self, f: F) -> Self {
        let data = self
            .data
            .iter()
            .map(|v| if self.is_nodata(*v) { *v } else { f(*v) })
            .collect();
        Self { data, ..*self }
    }

    /// Returns `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Returns the number of samples in this grid.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn nodata(&self) -> f32 {
        self.nodata
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns the sample at `(row, col)`, if in bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        let (rows, cols) = self.dimensions;
        (row < rows && col < cols).then(|| self.data[row * cols + col])
    }

    /// Returns `true` if `value` marks a missing sample.
    ///
    /// NaN is always missing, whatever the declared sentinel.
    #[inline]
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.nodata
    }

    /// Returns an iterator over the valid samples.
    pub fn valid_values(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| !self.is_nodata(*v))
    }

    pub fn valid_count(&self) -> usize {
        self.valid_values().count()
    }

    /// Returns the lowest and highest valid samples.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Returns the map-space extent covered by this grid.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> Rect<C> {
        let (rows, cols) = (self.rows() as C, self.cols() as C);
        let corners = [
            self.transform.apply(0.0, 0.0),
            self.transform.apply(cols, 0.0),
            self.transform.apply(0.0, rows),
            self.transform.apply(cols, rows),
        ];
        let (min_x, min_y, max_x, max_y) = corners.iter().fold(
            (C::INFINITY, C::INFINITY, C::NEG_INFINITY, C::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        );
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    }

    /// Returns `true` if `other` has the same shape, transform and
    /// CRS as `self`.
    pub fn same_geometry(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.transform == other.transform
            && self.crs == other.crs
    }
}

/// A grid observed at a known point in a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedGrid {
    pub time: TimeIndex,
    pub grid: Grid,
}

impl TimestampedGrid {
    pub fn new(time: TimeIndex, grid: Grid) -> Self {
        Self { time, grid }
    }
}

/// Returns the time index encoded as the final `_`-separated
/// component of `path`'s file stem.
///
/// `dyn_13.rgrd` yields 13 and `rain_20260206_14.rgrd` yields 14.
pub fn time_index_from_path<P: AsRef<Path>>(path: P) -> Result<TimeIndex, RasterError> {
    let mk_err = || RasterError::TimeIndex(path.as_ref().to_owned());
    let stem = path
        .as_ref()
        .file_stem()
        .and_then(OsStr::to_str)
        .ok_or_else(mk_err)?;
    let (_, suffix) = stem.rsplit_once('_').ok_or_else(mk_err)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(mk_err());
    }
    suffix.parse::<TimeIndex>().map_err(|_| mk_err())
}
