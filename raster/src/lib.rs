//! Single-band georeferenced grids.
//!
//! A [`Grid`] is a row-major block of `f32` samples together with the
//! affine transform, CRS and nodata sentinel needed to place it on the
//! earth. [`RasterStore`] persists grids to and from disk.

mod crs;
mod error;
mod grid;
mod store;
mod transform;

pub use crate::{
    crs::Crs,
    error::RasterError,
    grid::{time_index_from_path, Grid, TimeIndex, TimestampedGrid},
    store::{Compression, RasterStore, SpatialMetadata, EXTENSION},
    transform::GeoTransform,
};

/// Base floating point type used for all coordinates and calculations.
///
/// Samples are stored as `f32`; everything spatial (transforms,
/// projected coordinates, polygon vertices) uses this.
pub type C = f64;
