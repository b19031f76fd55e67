//! Loading time series of grids from disk.

use crate::HazardError;
use log::debug;
use raster::{time_index_from_path, RasterStore, TimeIndex, TimestampedGrid};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Reads every grid in `paths` and returns them ordered by the time
/// index in their file names.
///
/// Input order is irrelevant. Two files with the same time index are
/// rejected.
pub fn load_series<P: AsRef<Path> + Sync>(
    store: &RasterStore,
    paths: &[P],
) -> Result<Vec<TimestampedGrid>, HazardError> {
    let mut indexed = paths
        .iter()
        .map(|p| Ok((time_index_from_path(p)?, p.as_ref().to_owned())))
        .collect::<Result<Vec<(TimeIndex, PathBuf)>, HazardError>>()?;
    indexed.sort_by_key(|(time, _)| *time);
    if let Some(pair) = indexed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(HazardError::UnorderedSeries {
            previous: pair[0].0,
            current: pair[1].0,
        });
    }
    debug!(
        "loading series of {} grids: {:?}",
        indexed.len(),
        indexed.iter().map(|(t, _)| t).collect::<Vec<_>>()
    );
    indexed
        .par_iter()
        .map(|(time, path)| {
            let (grid, _) = store.read(path)?;
            Ok(TimestampedGrid::new(*time, grid))
        })
        .collect()
}
