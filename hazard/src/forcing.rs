//! Rainfall and soil-wetness forcing grids.

use crate::HazardError;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use raster::{Grid, TimeIndex, TimestampedGrid};
use std::io::Read;

const TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// One row of an hourly precipitation table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyRecord {
    pub time: NaiveDateTime,
    /// Precipitation in millimeters; NaN when the row left it blank.
    pub precip_mm: f32,
}

/// A grid together with the file stem it should be written under.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcingGrid {
    pub name: String,
    pub grid: TimestampedGrid,
}

/// Parses a `time,precip_mm` table.
///
/// The first record is a header naming the columns, in any order;
/// other columns are ignored. Blank lines and lines starting with `#`
/// are skipped. Times must be strictly increasing.
pub fn parse_hourly_csv<R: Read>(rdr: R) -> Result<Vec<HourlyRecord>, HazardError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);

    let headers = csv_reader
        .headers()
        .map_err(|e| HazardError::Configuration(format!("rainfall table header: {e}")))?;
    let time_col = resolve_column(headers, "time")?;
    let precip_col = resolve_column(headers, "precip_mm")?;

    let mut records: Vec<HourlyRecord> = Vec::new();
    for result in csv_reader.records() {
        let record = result.map_err(|e| HazardError::Configuration(e.to_string()))?;
        let lineno = record.position().map_or(0, csv::Position::line);
        let mk_err = |what: &str| HazardError::Configuration(format!("line {lineno}: {what}"));
        let time_str = record.get(time_col).ok_or_else(|| mk_err("missing time"))?;
        let time = parse_time(time_str).ok_or_else(|| mk_err(&format!("bad time {time_str:?}")))?;
        let precip_mm = match record.get(precip_col) {
            None | Some("") => f32::NAN,
            Some(s) => s
                .parse::<f32>()
                .map_err(|_| mk_err(&format!("bad precipitation {s:?}")))?,
        };
        if let Some(prev) = records.last() {
            if time <= prev.time {
                return Err(mk_err(&format!("{time} does not follow {}", prev.time)));
            }
        }
        records.push(HourlyRecord { time, precip_mm });
    }
    debug!("parsed {} hourly rainfall records", records.len());
    Ok(records)
}

fn resolve_column(headers: &csv::StringRecord, name: &str) -> Result<usize, HazardError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| HazardError::Configuration(format!("missing column {name:?}")))
}

fn parse_time(s: &str) -> Option<NaiveDateTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Returns one constant rainfall grid per record, each with
/// `template`'s geometry and nodata, named `rain_YYYYMMDD_HH` and
/// indexed by hour of day.
pub fn rasterize_hourly(template: &Grid, records: &[HourlyRecord]) -> Vec<ForcingGrid> {
    records
        .iter()
        .map(|record| ForcingGrid {
            name: format!("rain_{}", record.time.format("%Y%m%d_%H")),
            grid: TimestampedGrid::new(record.time.hour(), Grid::filled_like(template, record.precip_mm)),
        })
        .collect()
}

/// Constant-valued demonstration inputs for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticStorm {
    /// One rainfall grid per storm hour, in time order.
    pub rainfall: Vec<ForcingGrid>,
    /// Soil wetness for the whole day.
    pub soil: ForcingGrid,
}

/// Builds rainfall grids from `(hour, millimeters)` pairs plus a
/// uniform soil-wetness grid, all shaped like `template`.
pub fn synthetic_storm(
    template: &Grid,
    date: NaiveDate,
    storm: &[(TimeIndex, f32)],
    soil_wetness: f32,
) -> Result<SyntheticStorm, HazardError> {
    if let Some(pair) = storm.windows(2).find(|pair| pair[1].0 <= pair[0].0) {
        return Err(HazardError::UnorderedSeries {
            previous: pair[0].0,
            current: pair[1].0,
        });
    }
    if let Some((hour, _)) = storm.iter().find(|(hour, _)| *hour > 23) {
        return Err(HazardError::Configuration(format!(
            "storm hour {hour} is not an hour of day"
        )));
    }
    let day = date.format("%Y%m%d");
    let rainfall = storm
        .iter()
        .map(|(hour, mm)| ForcingGrid {
            name: format!("rain_{day}_{hour:02}"),
            grid: TimestampedGrid::new(*hour, Grid::filled_like(template, *mm)),
        })
        .collect();
    let soil = ForcingGrid {
        name: format!("wf_{day}"),
        grid: TimestampedGrid::new(0, Grid::filled_like(template, soil_wetness)),
    };
    Ok(SyntheticStorm { rainfall, soil })
}
