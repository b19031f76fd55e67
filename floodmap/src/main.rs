mod align;
mod clip;
mod eta;
mod forcing;
mod options;
mod stats;

use anyhow::Result;
use clap::Parser;
use options::Cli;
use serde::Serialize;
use std::io::Write;
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli {
        Cli::Align(align) => align.run(),
        Cli::Wetness(wetness) => wetness.run(),
        Cli::Clip(clip) => clip.run(),
        Cli::Eta(eta) => eta.run(),
        Cli::Stats(stats) => stats.run(),
        Cli::ImportRain(import) => import.run(),
        Cli::Synth(synth) => synth.run(),
    }
}

/// Writes `report` to stdout as pretty JSON.
pub fn print_report<T: Serialize>(report: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, report)?;
    writeln!(out)?;
    Ok(())
}
