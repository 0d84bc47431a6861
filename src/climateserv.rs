//! Minimal ClimateSERV API client: submit a request, poll until the
//! server has built the series, download it, write the chunk file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

const BASE_URL: &str = "https://climateserv.servirglobal.net/api";
const POLL_DELAY: Duration = Duration::from_secs(1);

/// Statistic the server computes over the polygon for each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Max,
    Min,
    Median,
    Range,
    Sum,
    Average,
}

impl Operation {
    /// Integer code used by the API.
    fn code(self) -> u8 {
        match self {
            Operation::Max => 0,
            Operation::Min => 1,
            Operation::Median => 2,
            Operation::Range => 3,
            Operation::Sum => 4,
            Operation::Average => 5,
        }
    }

    /// Key of this statistic in the per-day value objects.
    fn value_key(self) -> &'static str {
        match self {
            Operation::Max => "max",
            Operation::Min => "min",
            Operation::Median => "median",
            Operation::Range => "range",
            Operation::Sum => "sum",
            Operation::Average => "avg",
        }
    }
}

/// One polygon / one date window request.
#[derive(Debug)]
pub struct DataRequest<'a> {
    pub dataset_type: u32,
    pub operation: Operation,
    /// MM/DD/YYYY
    pub start_date: String,
    /// MM/DD/YYYY
    pub end_date: String,
    /// Closed exterior ring, `[x, y]` pairs in WGS84.
    pub geometry_coords: &'a [[f64; 2]],
    /// Must be present but empty for integer dataset IDs.
    pub seasonal_ensemble: String,
    pub seasonal_variable: String,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    data: Vec<SeriesEntry>,
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    date: String,
    value: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
struct SeriesPoint {
    date: String,
    avg: Option<f64>,
}

/// Requests one date window of data and writes it to `outfile`.
///
/// Any transport or decode failure propagates; the caller treats it as
/// fatal to the run.
pub async fn request_data(client: &Client, request: &DataRequest<'_>, outfile: &Path) -> Result<()> {
    let request_id = submit_request(client, request).await?;
    wait_for_completion(client, &request_id).await?;
    let points = download_series(client, &request_id, request.operation).await?;
    write_chunk_csv(outfile, &request_id, &points)?;

    Ok(())
}

async fn submit_request(client: &Client, request: &DataRequest<'_>) -> Result<String> {
    let geometry = serde_json::json!({
        "type": "Polygon",
        "coordinates": [request.geometry_coords],
    });

    let response = client
        .get(format!("{BASE_URL}/submitDataRequest/"))
        .query(&[
            ("datatype", request.dataset_type.to_string()),
            ("begintime", request.start_date.clone()),
            ("endtime", request.end_date.clone()),
            ("intervaltype", "0".to_string()),
            ("operationtype", request.operation.code().to_string()),
            ("dateType_Category", "default".to_string()),
            ("isZip_CurrentDataType", "false".to_string()),
            ("geometry", geometry.to_string()),
            ("seasonal_ensemble", request.seasonal_ensemble.clone()),
            ("seasonal_variable", request.seasonal_variable.clone()),
        ])
        .send()
        .await?
        .error_for_status()?;

    let ids: Vec<String> = response
        .json()
        .await
        .context("decoding submitDataRequest response")?;

    ids.into_iter()
        .next()
        .ok_or_else(|| anyhow!("submitDataRequest returned no request id"))
}

async fn wait_for_completion(client: &Client, request_id: &str) -> Result<()> {
    loop {
        let progress: Vec<f64> = client
            .get(format!("{BASE_URL}/getDataRequestProgress/"))
            .query(&[("id", request_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("decoding getDataRequestProgress response")?;

        let value = progress
            .first()
            .copied()
            .ok_or_else(|| anyhow!("empty progress response for request {request_id}"))?;

        if value < 0.0 {
            bail!("request {request_id} failed server-side (progress {value})");
        }
        if value >= 100.0 {
            return Ok(());
        }

        sleep(POLL_DELAY).await;
    }
}

async fn download_series(
    client: &Client,
    request_id: &str,
    operation: Operation,
) -> Result<Vec<SeriesPoint>> {
    let response: SeriesResponse = client
        .get(format!("{BASE_URL}/getDataFromRequest/"))
        .query(&[("id", request_id)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
        .context("decoding getDataFromRequest response")?;

    let key = operation.value_key();
    response
        .data
        .into_iter()
        .map(|entry| {
            let avg = entry.value.get(key).and_then(serde_json::Value::as_f64);
            Ok(SeriesPoint {
                date: normalize_date(&entry.date)?,
                avg,
            })
        })
        .collect()
}

/// The API reports dates without zero padding; chunk files carry them
/// zero-padded so every downstream consumer sees one format.
fn normalize_date(raw: &str) -> Result<String> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%m/%d/%Y")
        .with_context(|| format!("unparseable series date `{raw}`"))?;
    Ok(date.format("%m/%d/%Y").to_string())
}

/// First line is request metadata and is skipped by the reader; days with
/// no value are written with an empty field and dropped downstream.
fn write_chunk_csv(path: &Path, request_id: &str, points: &[SeriesPoint]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "request_id,{request_id}")?;

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["date", "avg"])?;
    for point in points {
        match point.avg {
            Some(avg) => writer.write_record([point.date.as_str(), &avg.to_string()])?,
            None => writer.write_record([point.date.as_str(), ""])?,
        }
    }
    writer.flush()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
