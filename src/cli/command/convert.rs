//! Extract a zip of shapefiles and dump each attribute table to CSV.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use shapefile::dbase::{self, FieldValue};

use crate::cli::create_spinner;
use crate::geometry::format_numeric;

const ZIP_PATH: &str = "./HOGARES_POBLACION.zip";
const EXTRACT_TO: &str = "./HOGARES_POBLACION";

pub fn convert() -> Result<String> {
    let extract_to = Path::new(EXTRACT_TO);
    fs::create_dir_all(extract_to)?;

    let bar = create_spinner("Extracting archive...".to_string());
    extract_zip(Path::new(ZIP_PATH), extract_to)?;
    bar.finish_with_message("Archive extracted");

    let bar = create_spinner("Converting shapefiles...".to_string());
    let converted = shapefiles_to_csv(extract_to)?;
    bar.finish_with_message(format!("{converted} attribute tables written"));

    Ok(format!("Attribute tables written under {}", extract_to.display()))
}

/// Full extraction; archive entries silently overwrite existing files.
fn extract_zip(zip_path: &Path, extract_to: &Path) -> Result<()> {
    let file = File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("reading {}", zip_path.display()))?;
    archive.extract(extract_to)?;

    Ok(())
}

/// Converts every shapefile under `root`, recursively. Returns the number
/// of attribute tables written.
fn shapefiles_to_csv(root: &Path) -> Result<usize> {
    let mut converted = 0;
    for shp_path in find_shapefiles(root)? {
        shapefile_to_csv(&shp_path)?;
        converted += 1;
    }

    Ok(converted)
}

fn find_shapefiles(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(root, &mut found)?;
    found.sort();

    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "shp") {
            found.push(path);
        }
    }

    Ok(())
}

/// Reads shapes and attributes, drops the geometry, and writes
/// `<stem>.csv` beside the source file with columns in dBase field order.
fn shapefile_to_csv(shp_path: &Path) -> Result<()> {
    let field_names = attribute_field_names(shp_path)?;

    let mut reader = shapefile::Reader::from_path(shp_path)
        .with_context(|| format!("opening {}", shp_path.display()))?;

    let csv_path = shp_path.with_extension("csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(&field_names)?;

    for result in reader.iter_shapes_and_records() {
        let (_geometry, record) = result?;
        let row: Vec<String> = field_names
            .iter()
            .map(|name| record.get(name).map(field_value_to_string).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Attribute column names in dBase file order.
fn attribute_field_names(shp_path: &Path) -> Result<Vec<String>> {
    let dbf_path = shp_path.with_extension("dbf");
    let reader = dbase::Reader::from_path(&dbf_path)
        .with_context(|| format!("opening {}", dbf_path.display()))?;

    Ok(reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect())
}

fn field_value_to_string(value: &FieldValue) -> String {
    match value {
        FieldValue::Character(Some(text)) => text.clone(),
        FieldValue::Character(None) => String::new(),
        FieldValue::Numeric(Some(number)) => format_numeric(*number),
        FieldValue::Numeric(None) => String::new(),
        FieldValue::Float(Some(number)) => number.to_string(),
        FieldValue::Float(None) => String::new(),
        FieldValue::Integer(number) => number.to_string(),
        FieldValue::Logical(Some(flag)) => flag.to_string(),
        FieldValue::Logical(None) => String::new(),
        FieldValue::Date(Some(date)) => {
            format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
        }
        FieldValue::Date(None) => String::new(),
        other => format!("{other:?}"),
    }
}

// -- Tests -------------------------------------------------------------------
