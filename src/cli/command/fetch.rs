//! Download CHIRPS daily precipitation series for every province polygon.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::NaiveDate;
use geo_types::Geometry;
use indicatif::ProgressBar;
use reqwest::Client;

use crate::{
    cli::create_progress_bar,
    climateserv::{self, DataRequest, Operation},
    geometry::{explode_multipolygons, exterior_ring_coords, load_provinces, Province},
    intervals::{generate_intervals, DateInterval},
    reading::DailyRow,
};

const GEOMETRY_PATH: &str = "./Pib_provincias_2020/Pib_provincias_2020.shp";

/// UCSB CHIRPS Rainfall
const DATASET_TYPE: u32 = 0;
const OPERATION: Operation = Operation::Average;
const EARLIEST_DATE: &str = "01/01/1981";
const LATEST_DATE: &str = "06/10/2024";
const CHUNK_SIZE_YEARS: i32 = 5;
// Must be sent empty when using the integer dataset IDs
const SEASONAL_ENSEMBLE: &str = "";
const SEASONAL_VARIABLE: &str = "";

pub async fn fetch() -> Result<String> {
    let provinces = load_provinces(Path::new(GEOMETRY_PATH))?;
    let provinces = explode_multipolygons(provinces);

    let start = NaiveDate::parse_from_str(EARLIEST_DATE, "%m/%d/%Y")?;
    let end = NaiveDate::parse_from_str(LATEST_DATE, "%m/%d/%Y")?;
    let intervals = generate_intervals(start, end, CHUNK_SIZE_YEARS);

    let client = Client::new();
    let work_dir = Path::new(".");
    let pb = create_progress_bar(provinces.len() as u64, "Fetching provinces...".to_string());

    let mut files_written = 0;
    for (index, province) in provinces.iter().enumerate() {
        if fetch_province(&client, province, index, &intervals, work_dir, &pb).await? {
            files_written += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("Fetch complete");

    Ok(format!("{files_written} province series written"))
}

/// Fetches the full series for one polygon. Returns whether a final file
/// was written. A final file that already exists skips the polygon, and an
/// existing temp file skips the download for its window.
async fn fetch_province(
    client: &Client,
    province: &Province,
    index: usize,
    intervals: &[DateInterval],
    work_dir: &Path,
    pb: &ProgressBar,
) -> Result<bool> {
    let final_outfile = final_file_name(work_dir, &province.name, index);
    if final_outfile.exists() {
        pb.println(format!(
            "Final output file {} already exists. Skipping province {} at index {}.",
            final_outfile.display(),
            province.name,
            index
        ));
        return Ok(false);
    }

    let ring = match &province.geometry {
        Geometry::Polygon(polygon) => {
            pb.println(format!(
                "Processing polygon for province {} at index {}",
                province.name, index
            ));
            exterior_ring_coords(polygon)
        }
        Geometry::MultiPolygon(_) => {
            pb.println(format!(
                "Skipping multi-part geometry for province {} at index {}",
                province.name, index
            ));
            return Ok(false);
        }
        _ => {
            pb.println(format!(
                "Skipping non-polygon geometry for province {} at index {}",
                province.name, index
            ));
            return Ok(false);
        }
    };

    let mut all_rows: Vec<DailyRow> = Vec::new();

    for interval in intervals {
        let temp_file = temp_file_name(work_dir, &province.name, index, interval);

        if temp_file.exists() {
            pb.println(format!(
                "Temporary file {} already exists. Skipping download.",
                temp_file.display()
            ));
        } else {
            let request = DataRequest {
                dataset_type: DATASET_TYPE,
                operation: OPERATION,
                start_date: interval.start_mdy(),
                end_date: interval.end_mdy(),
                geometry_coords: &ring,
                seasonal_ensemble: SEASONAL_ENSEMBLE.to_string(),
                seasonal_variable: SEASONAL_VARIABLE.to_string(),
            };
            climateserv::request_data(client, &request, &temp_file).await?;
            pb.println(format!(
                "Data requested for province {} (index {}) from {} to {}",
                province.name,
                index,
                interval.start_mdy(),
                interval.end_mdy()
            ));
        }

        if temp_file.exists() {
            let chunk_rows = crate::reading::read_chunk_file(&temp_file)?;
            all_rows.extend(chunk_rows.into_iter().map(|row| DailyRow {
                date: row.date,
                avg: row.avg,
                province: province.name.clone(),
                dpa_provin: province.code.clone(),
            }));
            fs::remove_file(&temp_file)?;
        } else {
            pb.println(format!(
                "File {} does not exist. Skipping interval {} to {}.",
                temp_file.display(),
                interval.start_mdy(),
                interval.end_mdy()
            ));
        }
    }

    if all_rows.is_empty() {
        pb.println(format!(
            "No data collected for province {} (index {}).",
            province.name, index
        ));
        return Ok(false);
    }

    write_series(&final_outfile, &all_rows)?;
    pb.println(format!(
        "All data for province {} (index {}) saved to {}",
        province.name,
        index,
        final_outfile.display()
    ));

    Ok(true)
}

fn final_file_name(dir: &Path, province: &str, index: usize) -> PathBuf {
    dir.join(format!("out_{province}_{index}.csv"))
}

fn temp_file_name(dir: &Path, province: &str, index: usize, interval: &DateInterval) -> PathBuf {
    dir.join(format!("temp_{province}_{index}_{}.csv", interval.file_tag()))
}

fn write_series(path: &Path, rows: &[DailyRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Datelike;

    fn test_province(geometry: Geometry<f64>) -> Province {
        Province {
            name: "X".to_string(),
            code: "1".to_string(),
            geometry,
        }
    }

    fn unit_square() -> geo_types::Polygon<f64> {
        geo_types::Polygon::new(
            geo_types::LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            vec![],
        )
    }

    #[test]
    fn should_name_output_files_by_province_and_index() {
        assert_eq!(
            final_file_name(Path::new("."), "Azuay", 3),
            PathBuf::from("./out_Azuay_3.csv")
        );
    }

    #[test]
    fn should_name_temp_files_by_interval() {
        let interval = DateInterval {
            start: NaiveDate::from_ymd_opt(1981, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(1985, 12, 31).unwrap(),
        };

        assert_eq!(
            temp_file_name(Path::new("."), "Azuay", 3, &interval),
            PathBuf::from("./temp_Azuay_3_01-01-1981_12-31-1985.csv")
        );
    }

    #[tokio::test]
    async fn should_skip_province_when_final_file_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        let existing = dir.path().join("out_X_0.csv");
        fs::write(&existing, "date,avg,Province,DPA_PROVIN\n").unwrap();

        let province = test_province(Geometry::Polygon(unit_square()));
        let intervals = generate_intervals(
            NaiveDate::from_ymd_opt(1981, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(1985, 12, 31).unwrap(),
            CHUNK_SIZE_YEARS,
        );
        let client = Client::new();
        let pb = ProgressBar::hidden();

        let written = fetch_province(&client, &province, 0, &intervals, dir.path(), &pb)
            .await
            .unwrap();

        // No request went out and the file is untouched
        assert!(!written);
        assert_eq!(
            fs::read_to_string(&existing).unwrap(),
            "date,avg,Province,DPA_PROVIN\n"
        );
    }

    #[tokio::test]
    async fn should_skip_residual_multipart_geometries() {
        let dir = tempfile::TempDir::new().unwrap();
        let province = test_province(Geometry::MultiPolygon(geo_types::MultiPolygon(vec![
            unit_square(),
            unit_square(),
        ])));
        let client = Client::new();
        let pb = ProgressBar::hidden();

        let written = fetch_province(&client, &province, 0, &[], dir.path(), &pb)
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn should_partition_the_configured_range_into_five_year_chunks() {
        let start = NaiveDate::parse_from_str(EARLIEST_DATE, "%m/%d/%Y").unwrap();
        let end = NaiveDate::parse_from_str(LATEST_DATE, "%m/%d/%Y").unwrap();

        let intervals = generate_intervals(start, end, CHUNK_SIZE_YEARS);

        assert_eq!(intervals.first().unwrap().start, start);
        assert_eq!(intervals.last().unwrap().end, end);
        assert!(intervals
            .iter()
            .all(|i| i.end.year() - i.start.year() < CHUNK_SIZE_YEARS));
    }

    #[test]
    fn should_write_series_with_the_expected_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out_X_0.csv");
        let rows = vec![DailyRow {
            date: "01/15/2020".to_string(),
            avg: 2.0,
            province: "X".to_string(),
            dpa_provin: "1".to_string(),
        }];

        write_series(&path, &rows).unwrap();
        let contents = fs::read_to_string(&path).unwrap();

        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("date,avg,Province,DPA_PROVIN"));
        assert_eq!(lines.next(), Some("01/15/2020,2.0,X,1"));
    }
}
