use crate::{
    options::{Align, Wetness},
    print_report,
};
use anyhow::Result;
use hazard::{
    pipeline::{align_files, wetness_pipeline},
    AlignConfig, BoundaryGeometry, ClipConfig,
};
use raster::RasterStore;

impl Align {
    pub fn config(&self) -> Result<AlignConfig> {
        Ok(AlignConfig::new(self.crs, self.resolution)?)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.config()?;
        let inputs = self.inputs.resolve()?;
        let report = align_files(&RasterStore::default(), &config, &inputs, &self.output.config())?;
        print_report(&report)
    }
}

impl Wetness {
    pub fn run(&self) -> Result<()> {
        let config = self.align.config()?;
        let clip = self
            .boundary
            .as_ref()
            .map(|path| BoundaryGeometry::open(path).map(|b| ClipConfig::new(b, self.fill)))
            .transpose()?;
        let inputs = self.align.inputs.resolve()?;
        let report = wetness_pipeline(
            &RasterStore::default(),
            &config,
            clip.as_ref(),
            &inputs,
            &self.align.output.config(),
        )?;
        print_report(&report)
    }
}
