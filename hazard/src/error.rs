use raster::{RasterError, TimeIndex};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HazardError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("degenerate normalization range: {0}")]
    DataRange(String),

    #[error("grid {index} does not share the series geometry")]
    ShapeMismatch { index: usize },

    #[error("empty risk series")]
    EmptySeries,

    #[error("time index {current} does not follow {previous}")]
    UnorderedSeries {
        previous: TimeIndex,
        current: TimeIndex,
    },

    #[error("boundary file not found {0:?}")]
    BoundaryNotFound(PathBuf),

    #[error("invalid boundary: {0}")]
    Boundary(String),

    #[error("no input grids{}", .0.as_ref().map(|d| format!(" in {d:?}")).unwrap_or_default())]
    NoInput(Option<PathBuf>),

    #[error("{0}")]
    Transfer(#[from] RasterError),

    #[error("projection: {0}")]
    Projection(String),
}

impl From<std::io::Error> for HazardError {
    fn from(e: std::io::Error) -> Self {
        Self::Transfer(RasterError::Io(e))
    }
}
