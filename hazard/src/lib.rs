//! Flood hazard mapping from environmental rasters.
//!
//! Grids from heterogeneous sources are aligned onto a common CRS and
//! resolution ([`GridAligner`]), normalized over a whole batch
//! ([`Normalizer`]), masked to a study area ([`BoundaryClipper`]), and
//! an ordered risk series is folded into a first-exceedance arrival
//! time map ([`RiskSeriesAggregator`]). The [`pipeline`] module drives
//! these over files on disk and reports an outcome for every input.

mod align;
mod boundary;
mod clip;
mod error;
mod eta;
pub mod forcing;
mod normalize;
pub mod pipeline;
mod projection;
mod series;
mod stats;

pub use crate::{
    align::{align, AlignConfig, GridAligner, TargetGeometry},
    boundary::BoundaryGeometry,
    clip::{clip, BoundaryClipper, ClipConfig, ClipOutcome, Coverage},
    error::HazardError,
    eta::{compute_eta, EtaConfig, RiskSeriesAggregator},
    normalize::{NormalizationRange, Normalizer},
    projection::Reprojector,
    series::load_series,
    stats::{distinct_values, GridSummary},
};
