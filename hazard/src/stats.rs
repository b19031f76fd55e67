//! Grid summaries for reporting.

use raster::{Crs, Grid};
use serde::{Serialize, Serializer};

/// Grids with at most this many distinct valid values report them.
pub const MAX_DISTINCT: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSummary {
    pub rows: usize,
    pub cols: usize,
    #[serde(serialize_with = "serialize_crs")]
    pub crs: Crs,
    pub valid: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    /// Sorted distinct valid values, if there are few enough.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<Vec<f32>>,
}

impl GridSummary {
    pub fn of(grid: &Grid) -> Self {
        let (min, max) = grid.min_max().unzip();
        Self {
            rows: grid.rows(),
            cols: grid.cols(),
            crs: grid.crs(),
            valid: grid.valid_count(),
            min,
            max,
            distinct: distinct_values(grid, MAX_DISTINCT),
        }
    }
}

/// Returns the sorted distinct valid values of `grid`, or `None` if
/// there are more than `limit`.
pub fn distinct_values(grid: &Grid, limit: usize) -> Option<Vec<f32>> {
    let mut distinct: Vec<f32> = Vec::new();
    for v in grid.valid_values() {
        if let Err(pos) = distinct.binary_search_by(|probe| probe.total_cmp(&v)) {
            if distinct.len() == limit {
                return None;
            }
            distinct.insert(pos, v);
        }
    }
    Some(distinct)
}

pub(crate) fn serialize_crs<S: Serializer>(crs: &Crs, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(crs)
}
