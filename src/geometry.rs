//! Province polygon loading and preparation for ClimateSERV requests.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use geo::SimplifyVwPreserve;
use geo_types::{Coord, Geometry, MultiPolygon, Polygon};
use proj4rs::Proj;
use shapefile::dbase::{FieldValue, Record};

/// Attribute holding the province name in the source shapefile.
const NAME_FIELD: &str = "provincias";
/// Attribute holding the numeric province code.
const CODE_FIELD: &str = "DPA_PROVIN";

/// Simplification tolerance; coarse enough to keep request payloads small.
const SIMPLIFY_TOLERANCE: f64 = 0.01;

const WGS84_PROJ_STRING: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// An administrative polygon with its identifying attributes.
#[derive(Debug, Clone)]
pub struct Province {
    pub name: String,
    pub code: String,
    pub geometry: Geometry<f64>,
}

/// Reads the province shapefile, reprojects to WGS84 when the `.prj`
/// sidecar describes a different reference frame, and simplifies each
/// geometry with a topology-preserving pass.
pub fn load_provinces(shp_path: &Path) -> Result<Vec<Province>> {
    let records = shapefile::read_as::<_, shapefile::Polygon, Record>(shp_path)
        .with_context(|| format!("reading shapefile {}", shp_path.display()))?;
    println!("Total number of polygons in the shapefile: {}", records.len());

    let projection = source_projection(shp_path)?;
    match &projection {
        Some(_) => println!("Reprojected to WGS84 (EPSG:4326)"),
        None => println!("Already in WGS84 (EPSG:4326)"),
    }

    let wgs84 = Proj::from_proj_string(WGS84_PROJ_STRING)
        .map_err(|e| anyhow!("building WGS84 projection: {e}"))?;

    let mut provinces = Vec::with_capacity(records.len());
    for (polygon, record) in records {
        let name = string_attribute(&record, NAME_FIELD)?;
        let code = string_attribute(&record, CODE_FIELD)?;

        let mut multi: MultiPolygon<f64> = polygon.into();
        if let Some(source) = &projection {
            multi = reproject(&multi, source, &wgs84)?;
        }
        let multi = multi.simplify_vw_preserve(SIMPLIFY_TOLERANCE);

        provinces.push(Province {
            name,
            code,
            geometry: Geometry::MultiPolygon(multi),
        });
    }

    Ok(provinces)
}

/// Returns the source projection when the sidecar describes something other
/// than geographic WGS84. A missing `.prj` is treated as already-WGS84.
fn source_projection(shp_path: &Path) -> Result<Option<Proj>> {
    let prj_path = shp_path.with_extension("prj");
    if !prj_path.exists() {
        return Ok(None);
    }

    let wkt = fs::read_to_string(&prj_path)
        .with_context(|| format!("reading {}", prj_path.display()))?;
    let proj_string = proj4wkt::wkt_to_projstring(wkt.trim())
        .map_err(|e| anyhow!("parsing {}: {e}", prj_path.display()))?;

    if is_wgs84(&proj_string) {
        return Ok(None);
    }

    let proj = Proj::from_proj_string(&proj_string)
        .map_err(|e| anyhow!("unsupported projection in {}: {e}", prj_path.display()))?;
    Ok(Some(proj))
}

fn is_wgs84(proj_string: &str) -> bool {
    proj_string.contains("+proj=longlat")
        && (proj_string.contains("+datum=WGS84") || proj_string.contains("+ellps=WGS84"))
}

fn reproject(
    multi: &MultiPolygon<f64>,
    source: &Proj,
    wgs84: &Proj,
) -> Result<MultiPolygon<f64>> {
    use geo::MapCoords;

    let source_is_latlong = source.is_latlong();
    multi.try_map_coords(|coord: Coord<f64>| {
        // proj4rs works in radians for geographic frames
        let mut point = if source_is_latlong {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        proj4rs::transform::transform(source, wgs84, &mut point)
            .map_err(|e| anyhow!("reprojecting ({}, {}): {e}", coord.x, coord.y))?;
        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    })
}

/// Splits every multi-part geometry into one record per constituent
/// polygon; the province attributes are copied onto every part.
pub fn explode_multipolygons(provinces: Vec<Province>) -> Vec<Province> {
    let mut singles = Vec::new();

    for province in provinces {
        let Province {
            name,
            code,
            geometry,
        } = province;

        match geometry {
            Geometry::MultiPolygon(multi) => {
                for polygon in multi {
                    singles.push(Province {
                        name: name.clone(),
                        code: code.clone(),
                        geometry: Geometry::Polygon(polygon),
                    });
                }
            }
            geometry => singles.push(Province {
                name,
                code,
                geometry,
            }),
        }
    }

    singles
}

/// Exterior ring as `[x, y]` pairs for the request payload. The ring is
/// closed: if the first and last coordinate differ, the first is appended.
pub fn exterior_ring_coords(polygon: &Polygon<f64>) -> Vec<[f64; 2]> {
    let mut coords: Vec<[f64; 2]> = polygon
        .exterior()
        .coords()
        .map(|c| [c.x, c.y])
        .collect();
    close_ring(&mut coords);
    coords
}

fn close_ring(coords: &mut Vec<[f64; 2]>) {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
}

fn string_attribute(record: &Record, field: &str) -> Result<String> {
    let value = record
        .get(field)
        .with_context(|| format!("shapefile record has no `{field}` attribute"))?;

    match value {
        FieldValue::Character(Some(text)) => Ok(text.trim().to_string()),
        FieldValue::Character(None) => Ok(String::new()),
        FieldValue::Numeric(Some(number)) => Ok(format_numeric(*number)),
        FieldValue::Numeric(None) => Ok(String::new()),
        FieldValue::Integer(number) => Ok(number.to_string()),
        other => bail!("attribute `{field}` has unsupported type: {other:?}"),
    }
}

/// Integral numerics print without a trailing `.0`, matching how the codes
/// appear in the attribute table.
pub fn format_numeric(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

// -- Tests -------------------------------------------------------------------
