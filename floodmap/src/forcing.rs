use crate::{
    options::{ImportRain, Synth},
    print_report,
};
use anyhow::Result;
use hazard::{
    forcing::{parse_hourly_csv, rasterize_hourly, synthetic_storm},
    pipeline::write_forcing,
};
use raster::RasterStore;
use std::fs::File;

impl ImportRain {
    pub fn run(&self) -> Result<()> {
        let store = RasterStore::default();
        let (template, _) = store.read(&self.template)?;
        let records = parse_hourly_csv(File::open(&self.csv)?)?;
        let grids = rasterize_hourly(&template, &records);
        let report = write_forcing(&store, &grids, &self.output.config())?;
        print_report(&report)
    }
}

impl Synth {
    pub fn run(&self) -> Result<()> {
        let store = RasterStore::default();
        let (template, _) = store.read(&self.template)?;
        let storm: Vec<_> = self.storm.iter().map(|s| (s.0, s.1)).collect();
        let storm = synthetic_storm(&template, self.date, &storm, self.soil)?;

        let output = self.output.config();
        let rainfall = output.clone().in_subdir("rainfall");
        let soil = output.in_subdir("soil");
        let reports = [
            write_forcing(&store, &storm.rainfall, &rainfall)?,
            write_forcing(&store, std::slice::from_ref(&storm.soil), &soil)?,
        ];
        print_report(&reports)
    }
}
