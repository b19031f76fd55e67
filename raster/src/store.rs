//! On-disk grid format.
//!
//! A little-endian header carrying everything needed to georeference
//! the samples, followed by the samples themselves, optionally
//! deflated:
//!
//! ```text
//! magic        4 bytes   "RGRD"
//! version      u16       1
//! compression  u8        0 = none, 1 = zlib
//! bands        u8        1
//! rows         u32
//! cols         u32
//! nodata       f32
//! transform    6 x f64   a b c d e f
//! crs          u32       EPSG code
//! samples      rows * cols x f32, row-major
//! ```

use crate::{Crs, GeoTransform, Grid, RasterError};
use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use flate2::{read::ZlibDecoder, write::ZlibEncoder};
use log::debug;
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

const MAGIC: [u8; 4] = *b"RGRD";
const VERSION: u16 = 1;
/// Bytes preceding the sample stream.
const HEADER_LEN: u64 = 72;
const SAMPLE_LEN: usize = 4;

/// File extension used for grids written by [`RasterStore`].
pub const EXTENSION: &str = "rgrd";

/// Sample stream encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    /// zlib stream at the given level (0-9).
    Deflate(u32),
    /// zlib stream at the default level.
    #[default]
    DeflateDefault,
}

impl Compression {
    fn code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Deflate(_) | Self::DeflateDefault => 1,
        }
    }

    fn from_code(code: u8) -> Result<Self, RasterError> {
        match code {
            0 => Ok(Self::None),
            1 => Ok(Self::DeflateDefault),
            other => Err(RasterError::Compression(other)),
        }
    }

    fn level(self) -> flate2::Compression {
        match self {
            Self::Deflate(level) => flate2::Compression::new(level.min(9)),
            Self::None | Self::DeflateDefault => flate2::Compression::default(),
        }
    }
}

/// Everything about a persisted grid except its samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMetadata {
    pub rows: usize,
    pub cols: usize,
    pub crs: Crs,
    pub transform: GeoTransform,
    pub nodata: f32,
    pub compression: Compression,
}

impl SpatialMetadata {
    /// Returns metadata describing `grid`.
    pub fn of(grid: &Grid, compression: Compression) -> Self {
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            crs: grid.crs(),
            transform: *grid.transform(),
            nodata: grid.nodata(),
            compression,
        }
    }

    fn describes(&self, grid: &Grid) -> bool {
        let nodata_eq = self.nodata == grid.nodata()
            || (self.nodata.is_nan() && grid.nodata().is_nan());
        self.rows == grid.rows()
            && self.cols == grid.cols()
            && self.crs == grid.crs()
            && self.transform == *grid.transform()
            && nodata_eq
    }
}

/// Reads and writes grids.
///
/// File handles never outlive a call. Writes go to a temporary
/// sibling first and are renamed over the destination only after
/// every byte has been flushed, so a failed write never leaves a
/// partial file at the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterStore {
    /// Encoding used by [`RasterStore::save`].
    compression: Compression,
}

impl RasterStore {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the grid stored at `path` and its metadata.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<(Grid, SpatialMetadata), RasterError> {
        let path = path.as_ref();
        debug!("reading {path:?}");
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut rdr = BufReader::new(file);

        let mut magic = [0_u8; 4];
        match rdr.read_exact(&mut magic) {
            Ok(()) if magic == MAGIC => (),
            Ok(()) => return Err(RasterError::Magic(path.to_owned())),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(RasterError::Magic(path.to_owned()))
            }
            Err(e) => return Err(e.into()),
        }
        let version = rdr.read_u16::<LE>()?;
        if version != VERSION {
            return Err(RasterError::Version(version));
        }
        let compression = Compression::from_code(rdr.read_u8()?)?;
        let bands = rdr.read_u8()?;
        if bands != 1 {
            return Err(RasterError::BandCount(bands));
        }
        let rows = rdr.read_u32::<LE>()? as usize;
        let cols = rdr.read_u32::<LE>()? as usize;
        let nodata = rdr.read_f32::<LE>()?;
        let mut coefficients = [0.0_f64; 6];
        rdr.read_f64_into::<LE>(&mut coefficients)?;
        let [a, b, c, d, e, f] = coefficients;
        let transform = GeoTransform::new(a, b, c, d, e, f);
        let crs = Crs::from_epsg(rdr.read_u32::<LE>()?);

        let expected = sample_count(rows, cols)?;
        let data = match compression {
            Compression::None => {
                #[allow(clippy::cast_possible_truncation)]
                let available = (file_len.saturating_sub(HEADER_LEN) / SAMPLE_LEN as u64) as usize;
                if available < expected {
                    return Err(RasterError::Shape {
                        rows,
                        cols,
                        actual: available,
                    });
                }
                read_samples(&mut rdr, rows, cols)?
            }
            Compression::Deflate(_) | Compression::DeflateDefault => {
                read_samples(&mut ZlibDecoder::new(rdr), rows, cols)?
            }
        };

        let grid = Grid::new(data, rows, cols, transform, crs, nodata)?;
        let metadata = SpatialMetadata::of(&grid, compression);
        Ok((grid, metadata))
    }

    /// Writes `grid` to `path` as described by `metadata`.
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        grid: &Grid,
        metadata: &SpatialMetadata,
    ) -> Result<(), RasterError> {
        let path = path.as_ref();
        if !metadata.describes(grid) {
            return Err(RasterError::Metadata(path.to_owned()));
        }
        debug!("writing {path:?}, compression: {:?}", metadata.compression);

        let tmp = TmpPath::for_dest(path);
        {
            let mut wtr = BufWriter::new(File::create(&tmp.0)?);
            write_header(&mut wtr, metadata)?;
            match metadata.compression {
                Compression::None => write_samples(&mut wtr, grid.data())?,
                level @ (Compression::Deflate(_) | Compression::DeflateDefault) => {
                    let mut enc = ZlibEncoder::new(&mut wtr, level.level());
                    write_samples(&mut enc, grid.data())?;
                    enc.finish()?;
                }
            }
            wtr.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        tmp.persist(path)?;
        Ok(())
    }

    /// Writes `grid` to `path` using this store's compression.
    pub fn save<P: AsRef<Path>>(&self, path: P, grid: &Grid) -> Result<(), RasterError> {
        let metadata = SpatialMetadata::of(grid, self.compression);
        self.write(path, grid, &metadata)
    }
}

fn write_header(wtr: &mut impl Write, metadata: &SpatialMetadata) -> Result<(), RasterError> {
    let dim = |n: usize| u32::try_from(n).map_err(|_| RasterError::Dimension(n));
    wtr.write_all(&MAGIC)?;
    wtr.write_u16::<LE>(VERSION)?;
    wtr.write_u8(metadata.compression.code())?;
    wtr.write_u8(1)?;
    wtr.write_u32::<LE>(dim(metadata.rows)?)?;
    wtr.write_u32::<LE>(dim(metadata.cols)?)?;
    wtr.write_f32::<LE>(metadata.nodata)?;
    for coefficient in metadata.transform.coefficients() {
        wtr.write_f64::<LE>(coefficient)?;
    }
    wtr.write_u32::<LE>(metadata.crs.epsg())?;
    Ok(())
}

fn write_samples(wtr: &mut impl Write, samples: &[f32]) -> Result<(), RasterError> {
    for sample in samples {
        wtr.write_f32::<LE>(*sample)?;
    }
    Ok(())
}

/// Returns `rows * cols`, failing if the sample stream would not be
/// addressable.
fn sample_count(rows: usize, cols: usize) -> Result<usize, RasterError> {
    rows.checked_mul(cols)
        .filter(|n| n.checked_mul(SAMPLE_LEN).is_some())
        .ok_or(RasterError::Dimension(rows.max(cols)))
}

/// Reads `rows * cols` samples. The buffer grows as samples arrive
/// rather than trusting the header up front.
fn read_samples(rdr: &mut impl Read, rows: usize, cols: usize) -> Result<Vec<f32>, RasterError> {
    let expected = sample_count(rows, cols)?;
    let mut samples = Vec::new();
    for _ in 0..expected {
        match rdr.read_f32::<LE>() {
            Ok(sample) => samples.push(sample),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(RasterError::Shape {
                    rows,
                    cols,
                    actual: samples.len(),
                })
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(samples)
}

/// Temporary sibling of a write destination, removed on drop unless
/// persisted.
struct TmpPath(PathBuf, bool);

impl TmpPath {
    fn for_dest(dest: &Path) -> Self {
        let mut p = dest.as_os_str().to_owned();
        p.push(".tmp");
        Self(PathBuf::from(p), false)
    }

    fn persist(mut self, dest: &Path) -> Result<(), RasterError> {
        fs::rename(&self.0, dest)?;
        self.1 = true;
        Ok(())
    }
}

impl Drop for TmpPath {
    fn drop(&mut self) {
        if !self.1 {
            let _ = fs::remove_file(&self.0);
        }
    }
}
