//! Roll the per-province daily series up to monthly total files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::reading::{aggregate_monthly, DailyRow, MonthlyTotal};

const INPUT_DIR: &str = "./";
const OUTPUT_DIR: &str = "./Monthly";
const OUTPUT_SUFFIX: &str = "_monthly_totals";

pub fn aggregate() -> Result<String> {
    let files = find_daily_files(Path::new(INPUT_DIR))?;
    fs::create_dir_all(OUTPUT_DIR)?;

    let mut files_written = 0;
    for file in &files {
        println!("Processing file: {}", file.display());
        if process_file(file)? {
            files_written += 1;
        }
    }

    Ok(format!("{files_written} monthly total files written"))
}

/// The fetcher's output files, sorted so repeated runs process them in the
/// same order.
fn find_daily_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("out_") && name.ends_with(".csv") {
            files.push(path);
        }
    }
    files.sort();

    Ok(files)
}

/// Aggregates one daily file. A file without a `date` column is reported
/// and skipped; the run continues.
fn process_file(file: &Path) -> Result<bool> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(file)?;

    let headers = reader.headers()?.clone();
    println!("Column names: {:?}", headers.iter().collect::<Vec<_>>());

    if !headers.iter().any(|h| h == "date") {
        eprintln!("Error: 'date' column not found in {}", file.display());
        return Ok(false);
    }

    let mut rows: Vec<DailyRow> = Vec::new();
    for result in reader.deserialize() {
        let row: DailyRow = result.with_context(|| format!("reading {}", file.display()))?;
        rows.push(row);
    }

    let totals = aggregate_monthly(&rows)?;
    write_totals(&monthly_file_name(file), &totals)?;

    Ok(true)
}

fn monthly_file_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    Path::new(OUTPUT_DIR).join(format!("{stem}{OUTPUT_SUFFIX}.csv"))
}

fn write_totals(path: &Path, totals: &[MonthlyTotal]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for total in totals {
        writer.serialize(total)?;
    }
    writer.flush()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn should_derive_monthly_file_name_from_input_stem() {
        assert_eq!(
            monthly_file_name(Path::new("./out_Azuay_3.csv")),
            Path::new("./Monthly").join("out_Azuay_3_monthly_totals.csv")
        );
    }

    #[test]
    fn should_write_totals_with_the_expected_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("totals.csv");
        let totals = vec![MonthlyTotal {
            province: "X".to_string(),
            dpa_provin: "1".to_string(),
            monthly_total_precipitation: 5.0,
            date: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
        }];

        write_totals(&path, &totals).unwrap();
        let contents = fs::read_to_string(&path).unwrap();

        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("Province,DPA_PROVIN,monthly_total_precipitation,date")
        );
        assert_eq!(lines.next(), Some("X,1,5.0,2020-01-31"));
    }

    #[test]
    fn should_select_only_fetcher_output_files() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join("out_A_0.csv"), "date,avg\n").unwrap();
        fs::write(dir.path().join("out_B_1.csv"), "date,avg\n").unwrap();
        fs::write(dir.path().join("temp_A_0_x.csv"), "date,avg\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let files = find_daily_files(dir.path()).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["out_A_0.csv", "out_B_1.csv"]);
    }

    #[test]
    fn should_skip_files_without_a_date_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("out_A_0.csv");
        fs::write(&file, "day,avg,Province,DPA_PROVIN\n01/15/2020,2.0,X,1\n").unwrap();

        // No output is produced for the skipped file
        assert!(!process_file(&file).unwrap());
    }

    #[test]
    fn should_aggregate_a_daily_file_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("out_X_0.csv");
        fs::write(
            &file,
            "date, avg, Province, DPA_PROVIN\n01/15/2020,2.0,X,1\n01/20/2020,3.0,X,1\n",
        )
        .unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_path(&file)
            .unwrap();
        let rows: Vec<DailyRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        let totals = aggregate_monthly(&rows).unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].monthly_total_precipitation, 5.0);
        assert_eq!(
            totals[0].date,
            NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()
        );
    }
}
