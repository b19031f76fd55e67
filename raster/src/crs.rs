//! Coordinate reference system identifiers.

use crate::RasterError;
use std::{fmt, str::FromStr};

/// An EPSG-coded coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs(u32);

impl Crs {
    /// WGS84 longitude/latitude, in degrees.
    pub const WGS84: Self = Self(4326);

    /// NAD83 longitude/latitude, in degrees.
    pub const NAD83: Self = Self(4269);

    /// Spherical (web) mercator, in meters.
    pub const WEB_MERCATOR: Self = Self(3857);

    pub const fn from_epsg(code: u32) -> Self {
        Self(code)
    }

    pub const fn epsg(self) -> u32 {
        self.0
    }

    /// Returns `true` if coordinates in this CRS are degrees of
    /// longitude and latitude.
    pub fn is_geographic(self) -> bool {
        matches!(self.0, 4326 | 4269)
    }

    /// Returns a PROJ.4 definition for the systems we know how to
    /// transform, `None` otherwise.
    pub fn proj_string(self) -> Option<String> {
        const NAD83_TOWGS84: &str = "+ellps=GRS80 +towgs84=0,0,0,0,0,0,0";
        match self.0 {
            4326 => Some("+proj=longlat +datum=WGS84 +no_defs".to_owned()),
            4269 => Some(format!("+proj=longlat {NAD83_TOWGS84} +no_defs")),
            3857 => Some(
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs"
                    .to_owned(),
            ),
            zone @ 32601..=32660 => Some(format!(
                "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
                zone - 32600
            )),
            zone @ 32701..=32760 => Some(format!(
                "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
                zone - 32700
            )),
            zone @ 26901..=26923 => Some(format!(
                "+proj=utm +zone={} {NAD83_TOWGS84} +units=m +no_defs",
                zone - 26900
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Parses `EPSG:26918`, a bare `26918`, or an OGC URN such as
/// `urn:ogc:def:crs:EPSG::26918` and `urn:ogc:def:crs:OGC:1.3:CRS84`.
impl FromStr for Crs {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mk_err = || RasterError::Crs(s.to_owned());
        let trimmed = s.trim();
        if trimmed.to_uppercase().ends_with("CRS84") {
            return Ok(Self::WGS84);
        }
        let code = trimmed.rsplit(':').next().ok_or_else(mk_err)?;
        let upper = trimmed.to_uppercase();
        if trimmed.contains(':') && !upper.contains("EPSG") {
            return Err(mk_err());
        }
        code.parse::<u32>().map(Self).map_err(|_| mk_err())
    }
}
