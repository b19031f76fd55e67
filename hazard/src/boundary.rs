//! Clip boundaries loaded from GeoJSON.

use crate::{projection::Reprojector, HazardError};
use geo::{
    geometry::{Geometry, GeometryCollection, MultiPolygon, Polygon, Rect},
    BoundingRect, MapCoords,
};
use geojson::{quick_collection, GeoJson, JsonObject};
use log::debug;
use raster::{Crs, C};
use std::{borrow::Cow, fs::File, io::Read, path::Path};

/// One or more polygons in a known CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryGeometry {
    polygons: MultiPolygon<C>,
    crs: Crs,
}

impl BoundaryGeometry {
    pub fn new(polygons: MultiPolygon<C>, crs: Crs) -> Result<Self, HazardError> {
        if polygons.0.is_empty() {
            return Err(HazardError::Boundary("no polygons".to_owned()));
        }
        Ok(Self { polygons, crs })
    }

    /// Loads a boundary from a GeoJSON file.
    ///
    /// The CRS is taken from a legacy top-level `"crs"` member when
    /// present and is WGS84 otherwise. Attributes are ignored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HazardError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(HazardError::BoundaryNotFound(path.to_owned()));
        }
        debug!("loading boundary {path:?}");
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, HazardError> {
        let geojson =
            GeoJson::from_reader(rdr).map_err(|e| HazardError::Boundary(e.to_string()))?;
        let crs = match foreign_members(&geojson).and_then(|m| m.get("crs")) {
            None => Crs::WGS84,
            Some(member) => member
                .pointer("/properties/name")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| HazardError::Boundary(format!("unrecognized crs member {member}")))?
                .parse::<Crs>()
                .map_err(|e| HazardError::Boundary(e.to_string()))?,
        };
        let collection: GeometryCollection<C> =
            quick_collection(&geojson).map_err(|e| HazardError::Boundary(e.to_string()))?;
        let mut polygons = Vec::new();
        collect_polygons(collection.0, &mut polygons);
        debug!("boundary has {} polygons in {crs}", polygons.len());
        Self::new(MultiPolygon::new(polygons), crs)
    }

    pub fn polygons(&self) -> &MultiPolygon<C> {
        &self.polygons
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Returns this boundary with every vertex transformed to `dst`.
    pub fn reproject(&self, dst: Crs) -> Result<Self, HazardError> {
        if dst == self.crs {
            return Ok(self.clone());
        }
        let reprojector = Reprojector::new(self.crs, dst)?;
        let polygons = self
            .polygons
            .try_map_coords(|coord| reprojector.transform_coord(coord))?;
        debug!("reprojected boundary {} -> {dst}", self.crs);
        Ok(Self { polygons, crs: dst })
    }

    /// Returns this boundary in `crs`, reprojecting only when needed.
    pub fn in_crs(&self, crs: Crs) -> Result<Cow<'_, Self>, HazardError> {
        if crs == self.crs {
            Ok(Cow::Borrowed(self))
        } else {
            Ok(Cow::Owned(self.reproject(crs)?))
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect<C>> {
        self.polygons.bounding_rect()
    }
}

fn foreign_members(geojson: &GeoJson) -> Option<&JsonObject> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.foreign_members.as_ref(),
        GeoJson::Feature(f) => f.foreign_members.as_ref(),
        GeoJson::Geometry(g) => g.foreign_members.as_ref(),
    }
}

fn collect_polygons(geometries: Vec<Geometry<C>>, out: &mut Vec<Polygon<C>>) {
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(p) => out.push(p),
            Geometry::MultiPolygon(mp) => out.extend(mp.0),
            Geometry::GeometryCollection(gc) => collect_polygons(gc.0, out),
            _ => (),
        }
    }
}
