//! Boundary masking and cropping.
//!
//! Boundaries are rasterized with an all-touched policy: a pixel is
//! included when its center lies inside a polygon or when any polygon
//! edge passes through the pixel's interior. Edges that only graze a
//! pixel's border or corner do not include it.

use crate::{boundary::BoundaryGeometry, HazardError};
use geo::{
    geometry::{Coord, LineString, MultiPolygon},
    BoundingRect, Contains, MapCoords,
};
use log::debug;
use raster::{Grid, C};
use rayon::prelude::*;
use serde::Serialize;

/// Boundary and fill value for clipping.
#[derive(Debug, Clone)]
pub struct ClipConfig {
    boundary: BoundaryGeometry,
    /// Value written outside the boundary; also the output's nodata.
    fill_value: f32,
}

impl ClipConfig {
    pub fn new(boundary: BoundaryGeometry, fill_value: f32) -> Self {
        Self {
            boundary,
            fill_value,
        }
    }

    pub fn boundary(&self) -> &BoundaryGeometry {
        &self.boundary
    }

    pub fn fill_value(&self) -> f32 {
        self.fill_value
    }
}

/// A clipped grid with valid-pixel counts before and after.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipOutcome {
    pub grid: Grid,
    pub valid_before: usize,
    pub valid_after: usize,
}

impl ClipOutcome {
    /// Percentage of valid pixels removed by the clip.
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_reduction(&self) -> f64 {
        if self.valid_before == 0 {
            return 0.0;
        }
        (1.0 - self.valid_after as f64 / self.valid_before as f64) * 100.0
    }

    pub fn coverage(&self) -> Coverage {
        Coverage {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            valid_before: self.valid_before,
            valid_after: self.valid_after,
            reduction_pct: self.coverage_reduction(),
        }
    }
}

/// Serializable summary of a [`ClipOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coverage {
    pub rows: usize,
    pub cols: usize,
    pub valid_before: usize,
    pub valid_after: usize,
    pub reduction_pct: f64,
}

/// Inclusive pixel window `rows.0..=rows.1`, `cols.0..=cols.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    rows: (usize, usize),
    cols: (usize, usize),
}

impl Window {
    fn height(&self) -> usize {
        self.rows.1 - self.rows.0 + 1
    }

    fn width(&self) -> usize {
        self.cols.1 - self.cols.0 + 1
    }
}

pub struct BoundaryClipper {
    config: ClipConfig,
}

impl BoundaryClipper {
    pub fn new(config: ClipConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClipConfig {
        &self.config
    }

    /// Masks `grid` to the boundary and crops it to the included
    /// pixels.
    ///
    /// A boundary that misses the grid entirely yields a grid of the
    /// input's shape filled with the fill value.
    pub fn clip(&self, grid: &Grid) -> Result<ClipOutcome, HazardError> {
        let fill = self.config.fill_value;
        let boundary = self.config.boundary.in_crs(grid.crs())?;
        let inverse = grid.transform().inverse().ok_or_else(|| {
            HazardError::Configuration(format!(
                "grid transform {:?} is not invertible",
                grid.transform()
            ))
        })?;
        let pixel_polygons = boundary.polygons().map_coords(|Coord { x, y }| {
            let (col, row) = inverse.apply(x, y);
            Coord { x: col, y: row }
        });

        let valid_before = grid.valid_count();
        let (rows, cols) = grid.shape();
        let mask = rasterize_all_touched(&pixel_polygons, rows, cols);
        let Some(window) = included_window(&mask, cols) else {
            debug!("boundary does not intersect {rows}x{cols} grid");
            return Ok(ClipOutcome {
                grid: Grid::filled_like(grid, fill).with_nodata(fill),
                valid_before,
                valid_after: 0,
            });
        };

        let mut data = Vec::with_capacity(window.height() * window.width());
        for row in window.rows.0..=window.rows.1 {
            for col in window.cols.0..=window.cols.1 {
                let idx = row * cols + col;
                let v = grid.data()[idx];
                data.push(if mask[idx] && !grid.is_nodata(v) { v } else { fill });
            }
        }
        let clipped = Grid::new(
            data,
            window.height(),
            window.width(),
            grid.transform().translate_pixels(window.cols.0, window.rows.0),
            grid.crs(),
            fill,
        )?;
        let valid_after = clipped.valid_count();
        debug!(
            "clipped {rows}x{cols} to {}x{}, valid {valid_before} -> {valid_after}",
            window.height(),
            window.width()
        );
        Ok(ClipOutcome {
            grid: clipped,
            valid_before,
            valid_after,
        })
    }
}

/// Clips `grid` to `boundary`, filling excluded pixels with
/// `fill_value`.
pub fn clip(grid: &Grid, boundary: &BoundaryGeometry, fill_value: f32) -> Result<Grid, HazardError> {
    let clipper = BoundaryClipper::new(ClipConfig::new(boundary.clone(), fill_value));
    Ok(clipper.clip(grid)?.grid)
}

/// Returns a row-major inclusion mask for polygons given in pixel
/// coordinates.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn rasterize_all_touched(polygons: &MultiPolygon<C>, rows: usize, cols: usize) -> Vec<bool> {
    let mut mask = vec![false; rows * cols];
    let Some(extent) = polygons.bounding_rect().filter(|_| rows > 0 && cols > 0) else {
        return mask;
    };
    // Candidate pixels, clamped to the grid.
    let span = |lo: C, hi: C, n: usize| -> Option<(usize, usize)> {
        let lo = lo.floor().max(0.0);
        let hi = hi.ceil().min(n as C);
        (lo < hi).then(|| (lo as usize, hi as usize))
    };
    let (Some((c0, c1)), Some((r0, r1))) = (
        span(extent.min().x, extent.max().x, cols),
        span(extent.min().y, extent.max().y, rows),
    ) else {
        return mask;
    };

    mask.par_chunks_mut(cols)
        .enumerate()
        .skip(r0)
        .take(r1 - r0)
        .for_each(|(row, mask_row)| {
            for (col, included) in mask_row.iter_mut().enumerate().take(c1).skip(c0) {
                let center = Coord {
                    x: col as C + 0.5,
                    y: row as C + 0.5,
                };
                *included = polygons.iter().any(|p| p.contains(&center));
            }
        });

    for polygon in polygons {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            mark_ring(ring, &mut mask, rows, cols);
        }
    }
    mask
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn mark_ring(ring: &LineString<C>, mask: &mut [bool], rows: usize, cols: usize) {
    for line in ring.lines() {
        let (a, b) = (line.start, line.end);
        let c_lo = a.x.min(b.x).floor().max(0.0) as usize;
        let c_hi = (a.x.max(b.x).floor().max(-1.0) + 1.0).min(cols as C) as usize;
        let r_lo = a.y.min(b.y).floor().max(0.0) as usize;
        let r_hi = (a.y.max(b.y).floor().max(-1.0) + 1.0).min(rows as C) as usize;
        for row in r_lo..r_hi {
            for col in c_lo..c_hi {
                if !mask[row * cols + col] && crosses_interior(a, b, col as C, row as C) {
                    mask[row * cols + col] = true;
                }
            }
        }
    }
}

/// Returns `true` if segment `a`-`b` passes through the open unit
/// square with upper-left corner `(col, row)`.
fn crosses_interior(a: Coord<C>, b: Coord<C>, col: C, row: C) -> bool {
    let (mut enter, mut exit) = (0.0, 1.0);
    for (p, d, lo) in [(a.x, b.x - a.x, col), (a.y, b.y - a.y, row)] {
        let hi = lo + 1.0;
        if d == 0.0 {
            if p <= lo || p >= hi {
                return false;
            }
            continue;
        }
        let (t0, t1) = ((lo - p) / d, (hi - p) / d);
        enter = C::max(enter, t0.min(t1));
        exit = C::min(exit, t0.max(t1));
    }
    enter < exit
}

/// Returns the tight window around the included pixels.
fn included_window(mask: &[bool], cols: usize) -> Option<Window> {
    let mut window: Option<Window> = None;
    for (idx, _) in mask.iter().enumerate().filter(|(_, included)| **included) {
        let (row, col) = (idx / cols, idx % cols);
        window = Some(match window {
            None => Window {
                rows: (row, row),
                cols: (col, col),
            },
            Some(w) => Window {
                rows: (w.rows.0.min(row), w.rows.1.max(row)),
                cols: (w.cols.0.min(col), w.cols.1.max(col)),
            },
        });
    }
    window
}

#[cfg(test)]
mod tests {
    use super::{clip, crosses_interior, BoundaryClipper, ClipConfig};
    use crate::boundary::BoundaryGeometry;
    use geo::{
        geometry::{Coord, MultiPolygon},
        polygon,
    };
    use raster::{Crs, GeoTransform, Grid};

    const UTM: Crs = Crs::from_epsg(26918);

    /// `rows x cols` grid of unit pixels whose lower-left corner is the
    /// map origin, valued by index.
    fn grid(rows: usize, cols: usize) -> Grid {
        #[allow(clippy::cast_precision_loss)]
        let data = (0..rows * cols).map(|i| i as f32 + 1.0).collect();
        #[allow(clippy::cast_precision_loss)]
        let transform = GeoTransform::from_origin(0.0, rows as f64, 1.0, 1.0);
        Grid::new(data, rows, cols, transform, UTM, -9999.0).unwrap()
    }

    fn boundary(polygon: geo::Polygon<f64>) -> BoundaryGeometry {
        BoundaryGeometry::new(MultiPolygon::new(vec![polygon]), UTM).unwrap()
    }

    #[test]
    fn test_pixel_aligned_square() {
        let g = grid(10, 10);
        let square = polygon![(x: 2.0, y: 2.0), (x: 5.0, y: 2.0), (x: 5.0, y: 5.0), (x: 2.0, y: 5.0)];
        let clipper = BoundaryClipper::new(ClipConfig::new(boundary(square), 0.0));
        let outcome = clipper.clip(&g).unwrap();
        assert_eq!(outcome.grid.shape(), (3, 3));
        assert_eq!(outcome.valid_after, 9);
        assert_eq!(outcome.valid_before, 100);
        assert!((outcome.coverage_reduction() - 91.0).abs() < 1e-9);
        // Output pixel (0, 0) sits where input pixel (row 5, col 2) did.
        assert_eq!(outcome.grid.transform().apply(0.0, 0.0), (2.0, 5.0));
        assert_eq!(outcome.grid.get(0, 0), g.get(5, 2));
        assert_eq!(outcome.grid.nodata(), 0.0);
    }

    #[test]
    fn test_all_touched_includes_partial_pixels() {
        let g = grid(10, 10);
        let small = polygon![(x: 2.9, y: 2.9), (x: 4.1, y: 2.9), (x: 4.1, y: 4.1), (x: 2.9, y: 4.1)];
        let clipped = clip(&g, &boundary(small), 0.0).unwrap();
        // Only one pixel center is inside, but nine pixels are touched.
        assert_eq!(clipped.shape(), (3, 3));
        assert_eq!(clipped.valid_count(), 9);
    }

    #[test]
    fn test_corner_contact_excluded() {
        let g = grid(4, 4);
        let triangle = polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 0.0, y: 4.0)];
        let clipped = clip(&g, &boundary(triangle), 0.0).unwrap();
        assert_eq!(clipped.shape(), (4, 4));
        for row in 0..4 {
            for col in 0..4 {
                let v = clipped.get(row, col).unwrap();
                if col <= row {
                    assert_eq!(Some(v), g.get(row, col), "({row}, {col})");
                } else {
                    assert_eq!(v, 0.0, "({row}, {col})");
                }
            }
        }
        assert_eq!(clipped.valid_count(), 10);
    }

    #[test]
    fn test_interior_ring_excludes_hole() {
        let g = grid(10, 10);
        let holed = polygon![
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 3.0, y: 3.0), (x: 7.0, y: 3.0), (x: 7.0, y: 7.0), (x: 3.0, y: 7.0)]]
        ];
        let clipped = clip(&g, &boundary(holed), 0.0).unwrap();
        assert_eq!(clipped.shape(), (10, 10));
        assert_eq!(clipped.valid_count(), 84);
        // Rows 3..7 and columns 3..7 lie inside the hole.
        assert_eq!(clipped.get(5, 5), Some(0.0));
        assert_eq!(clipped.get(2, 5), g.get(2, 5));
    }

    #[test]
    fn test_interior_ring_edges_touch_pixels() {
        let g = grid(10, 10);
        let holed = polygon![
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 3.5, y: 3.5), (x: 6.5, y: 3.5), (x: 6.5, y: 6.5), (x: 3.5, y: 6.5)]]
        ];
        let clipped = clip(&g, &boundary(holed), 0.0).unwrap();
        // Only the 2x2 pixels wholly inside the hole are dropped.
        assert_eq!(clipped.valid_count(), 96);
    }

    #[test]
    fn test_multi_polygon_spans_parts() {
        let g = grid(10, 10);
        let upper_left = polygon![(x: 0.0, y: 8.0), (x: 2.0, y: 8.0), (x: 2.0, y: 10.0), (x: 0.0, y: 10.0)];
        let lower_right = polygon![(x: 7.0, y: 1.0), (x: 9.0, y: 1.0), (x: 9.0, y: 3.0), (x: 7.0, y: 3.0)];
        let parts = BoundaryGeometry::new(MultiPolygon::new(vec![upper_left, lower_right]), UTM).unwrap();
        let outcome = BoundaryClipper::new(ClipConfig::new(parts, 0.0)).clip(&g).unwrap();
        assert_eq!(outcome.grid.shape(), (9, 9));
        assert_eq!(outcome.valid_after, 8);
        assert_eq!(outcome.grid.get(0, 0), g.get(0, 0));
        assert_eq!(outcome.grid.get(8, 8), g.get(8, 8));
        assert_eq!(outcome.grid.get(4, 4), Some(0.0));
    }

    #[test]
    fn test_disjoint_boundary_fills_grid() {
        let g = grid(5, 5);
        let far = polygon![(x: 100.0, y: 100.0), (x: 110.0, y: 100.0), (x: 110.0, y: 110.0)];
        let clipper = BoundaryClipper::new(ClipConfig::new(boundary(far), -1.0));
        let outcome = clipper.clip(&g).unwrap();
        assert!(outcome.grid.same_geometry(&g));
        assert!(outcome.grid.data().iter().all(|v| *v == -1.0));
        assert_eq!(outcome.valid_after, 0);
        assert!((outcome.coverage_reduction() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_nodata_inside_boundary_becomes_fill() {
        let mut data = vec![1.0_f32; 9];
        data[4] = -9999.0;
        let g = Grid::new(
            data,
            3,
            3,
            GeoTransform::from_origin(0.0, 3.0, 1.0, 1.0),
            UTM,
            -9999.0,
        )
        .unwrap();
        let all = polygon![(x: -1.0, y: -1.0), (x: 4.0, y: -1.0), (x: 4.0, y: 4.0), (x: -1.0, y: 4.0)];
        let outcome = BoundaryClipper::new(ClipConfig::new(boundary(all), 0.0))
            .clip(&g)
            .unwrap();
        assert_eq!(outcome.grid.shape(), (3, 3));
        assert_eq!(outcome.grid.data()[4], 0.0);
        assert_eq!(outcome.valid_before, 8);
        assert_eq!(outcome.valid_after, 8);
        assert!(outcome.valid_after <= outcome.valid_before);
    }

    #[test]
    fn test_reprojects_boundary() {
        // 1 km UTM 18N pixels around Jersey City.
        let g = Grid::filled(
            30,
            30,
            0.5,
            GeoTransform::from_origin(565_000.0, 4_525_000.0, 1000.0, 1000.0),
            UTM,
            -9999.0,
        );
        let lonlat = polygon![(x: -74.10, y: 40.70), (x: -74.02, y: 40.70), (x: -74.02, y: 40.76), (x: -74.10, y: 40.76)];
        let b = BoundaryGeometry::new(MultiPolygon::new(vec![lonlat]), Crs::WGS84).unwrap();
        let clipped = clip(&g, &b, 0.0).unwrap();
        assert!(clipped.rows() < 30 && clipped.cols() < 30);
        assert!(clipped.valid_count() > 0);
        assert_eq!(clipped.crs(), UTM);
    }

    #[test]
    fn test_crosses_interior() {
        let c = |x, y| Coord { x, y };
        // Through the middle.
        assert!(crosses_interior(c(-1.0, 0.5), c(2.0, 0.5), 0.0, 0.0));
        // Along the border.
        assert!(!crosses_interior(c(-1.0, 0.0), c(2.0, 0.0), 0.0, 0.0));
        // Through a corner only.
        assert!(!crosses_interior(c(0.0, 2.0), c(2.0, 0.0), 0.0, 0.0));
        // Entirely inside.
        assert!(crosses_interior(c(0.2, 0.2), c(0.4, 0.3), 0.0, 0.0));
        // Stops short.
        assert!(!crosses_interior(c(-2.0, 0.5), c(-0.1, 0.5), 0.0, 0.0));
    }
}
