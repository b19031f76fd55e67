use crate::{options::Stats, print_report};
use anyhow::Result;
use hazard::GridSummary;
use raster::RasterStore;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct FileSummary<'a> {
    input: &'a Path,
    #[serde(flatten)]
    summary: GridSummary,
}

impl Stats {
    pub fn run(&self) -> Result<()> {
        let store = RasterStore::default();
        let mut summaries = Vec::with_capacity(self.input.len());
        for input in &self.input {
            let (grid, _) = store.read(input)?;
            summaries.push(FileSummary {
                input,
                summary: GridSummary::of(&grid),
            });
        }
        print_report(&summaries)
    }
}
