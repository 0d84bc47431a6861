//! Daily series rows as written by the fetcher and read back by the aggregator.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One day of data for one province, as stored in the `out_*.csv` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRow {
    pub date: String,
    pub avg: f64,
    #[serde(rename = "Province")]
    pub province: String,
    #[serde(rename = "DPA_PROVIN")]
    pub dpa_provin: String,
}

/// One day of data from a temporary chunk file, before province identity
/// is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub date: String,
    pub avg: f64,
}

#[derive(Debug, Deserialize)]
struct RawChunkRow {
    date: Option<String>,
    avg: Option<f64>,
}

/// Reads a temporary chunk file written by the ClimateSERV client.
///
/// The first line is request metadata, not part of the table. Rows with a
/// missing date or value are dropped.
pub fn read_chunk_file(path: &Path) -> Result<Vec<ChunkRow>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut metadata = String::new();
    reader.read_line(&mut metadata)?;

    let mut rows = Vec::new();
    for result in csv::Reader::from_reader(reader).deserialize() {
        let raw: RawChunkRow = result.with_context(|| format!("reading {}", path.display()))?;
        if let (Some(date), Some(avg)) = (raw.date, raw.avg) {
            if avg.is_finite() {
                rows.push(ChunkRow { date, avg });
            }
        }
    }

    Ok(rows)
}

// -- Tests -------------------------------------------------------------------
