//! CRS-to-CRS coordinate transformation.

use crate::HazardError;
use geo::geometry::{Coord, Rect};
use proj4rs::{proj::Proj, transform::transform};
use raster::{Crs, C};
use std::fmt;

/// Number of points sampled along each edge when transforming a
/// rectangle. Projected edges are curves, so corners alone
/// underestimate the extent.
const EDGE_SAMPLES: usize = 21;

/// Transforms coordinates from one [`Crs`] to another.
///
/// Geographic coordinates are degrees (longitude, latitude) on both
/// sides of the API.
pub struct Reprojector {
    src: Crs,
    dst: Crs,
    strategy: Strategy,
}

enum Strategy {
    Identity,
    Proj4 { src: Box<Proj>, dst: Box<Proj> },
}

impl fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojector")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("identity", &matches!(self.strategy, Strategy::Identity))
            .finish()
    }
}

fn proj_for(crs: Crs) -> Result<Proj, HazardError> {
    let def = crs
        .proj_string()
        .ok_or_else(|| HazardError::Projection(format!("{crs} is not supported")))?;
    Proj::from_proj_string(&def).map_err(|e| HazardError::Projection(format!("{crs}: {e:?}")))
}

impl Reprojector {
    pub fn new(src: Crs, dst: Crs) -> Result<Self, HazardError> {
        let strategy = if src == dst {
            Strategy::Identity
        } else {
            Strategy::Proj4 {
                src: Box::new(proj_for(src)?),
                dst: Box::new(proj_for(dst)?),
            }
        };
        Ok(Self { src, dst, strategy })
    }

    pub fn src(&self) -> Crs {
        self.src
    }

    pub fn dst(&self) -> Crs {
        self.dst
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.strategy, Strategy::Identity)
    }

    /// Returns the reverse transformation.
    pub fn inverse(&self) -> Result<Self, HazardError> {
        Self::new(self.dst, self.src)
    }

    /// Transforms a single `(x, y)`.
    #[inline]
    pub fn transform(&self, x: C, y: C) -> Result<(C, C), HazardError> {
        let Strategy::Proj4 { src, dst } = &self.strategy else {
            return Ok((x, y));
        };
        let mut point = if self.src.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };
        transform(src, dst, &mut point).map_err(|e| {
            HazardError::Projection(format!("({x}, {y}) {} -> {}: {e:?}", self.src, self.dst))
        })?;
        let (out_x, out_y) = if self.dst.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !(out_x.is_finite() && out_y.is_finite()) {
            return Err(HazardError::Projection(format!(
                "({x}, {y}) {} -> {} is not finite",
                self.src, self.dst
            )));
        }
        Ok((out_x, out_y))
    }

    pub fn transform_coord(&self, coord: Coord<C>) -> Result<Coord<C>, HazardError> {
        let (x, y) = self.transform(coord.x, coord.y)?;
        Ok(Coord { x, y })
    }

    /// Returns the bounding box of `rect` in the destination CRS,
    /// sampling each edge rather than only the corners.
    #[allow(clippy::cast_precision_loss)]
    pub fn transform_bounds(&self, rect: Rect<C>) -> Result<Rect<C>, HazardError> {
        if self.is_identity() {
            return Ok(rect);
        }
        let (min, max) = (rect.min(), rect.max());
        let mut lo = Coord {
            x: C::INFINITY,
            y: C::INFINITY,
        };
        let mut hi = Coord {
            x: C::NEG_INFINITY,
            y: C::NEG_INFINITY,
        };
        let last = (EDGE_SAMPLES - 1) as C;
        for i in 0..EDGE_SAMPLES {
            let t = i as C / last;
            let x = min.x + t * (max.x - min.x);
            let y = min.y + t * (max.y - min.y);
            for (px, py) in [(x, min.y), (x, max.y), (min.x, y), (max.x, y)] {
                let (tx, ty) = self.transform(px, py)?;
                lo.x = lo.x.min(tx);
                lo.y = lo.y.min(ty);
                hi.x = hi.x.max(tx);
                hi.y = hi.y.max(ty);
            }
        }
        Ok(Rect::new(lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::{Crs, Reprojector};
    use approx::assert_relative_eq;
    use geo::geometry::{Coord, Rect};

    #[test]
    fn test_same_crs_is_identity() {
        let p = Reprojector::new(Crs::from_epsg(2263), Crs::from_epsg(2263)).unwrap();
        assert!(p.is_identity());
        assert_eq!(p.transform(1.5, -2.5).unwrap(), (1.5, -2.5));
    }

    #[test]
    fn test_unsupported_crs() {
        assert!(Reprojector::new(Crs::WGS84, Crs::from_epsg(2263)).is_err());
    }

    #[test]
    fn test_wgs84_to_web_mercator() {
        let p = Reprojector::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let (x, y) = p.transform(0.0, 0.0).unwrap();
        assert_relative_eq!(x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
        let (x, _) = p.transform(180.0, 0.0).unwrap();
        assert_relative_eq!(x, 20_037_508.342_789_244, epsilon = 1e-3);
    }

    #[test]
    fn test_utm_roundtrip() {
        let fwd = Reprojector::new(Crs::WGS84, Crs::from_epsg(32618)).unwrap();
        let inv = fwd.inverse().unwrap();
        // Central meridian of zone 18 maps to the false easting.
        let (x, _) = fwd.transform(-75.0, 40.0).unwrap();
        assert_relative_eq!(x, 500_000.0, epsilon = 1e-3);
        let (x, y) = fwd.transform(-74.0, 40.7).unwrap();
        let (lon, lat) = inv.transform(x, y).unwrap();
        assert_relative_eq!(lon, -74.0, epsilon = 1e-7);
        assert_relative_eq!(lat, 40.7, epsilon = 1e-7);
    }

    #[test]
    fn test_bounds_cover_corners() {
        let p = Reprojector::new(Crs::WGS84, Crs::from_epsg(32618)).unwrap();
        let rect = Rect::new(Coord { x: -74.3, y: 40.5 }, Coord { x: -73.7, y: 40.9 });
        let out = p.transform_bounds(rect).unwrap();
        for (x, y) in [(-74.3, 40.5), (-73.7, 40.5), (-74.3, 40.9), (-73.7, 40.9)] {
            let (tx, ty) = p.transform(x, y).unwrap();
            assert!(tx >= out.min().x && tx <= out.max().x);
            assert!(ty >= out.min().y && ty <= out.max().y);
        }
    }
}
