use crate::{options::Clip, print_report};
use anyhow::Result;
use hazard::{pipeline::clip_files, BoundaryGeometry, ClipConfig};
use raster::RasterStore;

impl Clip {
    pub fn run(&self) -> Result<()> {
        let boundary = BoundaryGeometry::open(&self.boundary)?;
        let config = ClipConfig::new(boundary, self.fill);
        let inputs = self.inputs.resolve()?;
        let report = clip_files(&RasterStore::default(), &config, &inputs, &self.output.config())?;
        print_report(&report)
    }
}
