use crate::{options::Eta, print_report};
use anyhow::Result;
use hazard::{pipeline::eta_pipeline, EtaConfig};
use raster::RasterStore;

impl Eta {
    pub fn run(&self) -> Result<()> {
        let config = EtaConfig::new(self.threshold, self.unset)?;
        let inputs = self.inputs.resolve()?;
        let report = eta_pipeline(
            &RasterStore::default(),
            &config,
            &inputs,
            &self.output.config(),
            &self.name,
        )?;
        print_report(&report)
    }
}
