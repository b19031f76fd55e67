use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("not a raster grid file {0:?}")]
    Magic(PathBuf),

    #[error("unsupported raster format version {0}")]
    Version(u16),

    #[error("unknown compression code {0}")]
    Compression(u8),

    #[error("expected a single band, found {0}")]
    BandCount(u8),

    #[error("sample count {actual} does not match {rows}x{cols} grid")]
    Shape {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("dimension {0} too large to persist")]
    Dimension(usize),

    #[error("metadata does not describe the grid written to {0:?}")]
    Metadata(PathBuf),

    #[error("invalid CRS identifier {0:?}")]
    Crs(String),

    #[error("no time index in file name {0:?}")]
    TimeIndex(PathBuf),
}
