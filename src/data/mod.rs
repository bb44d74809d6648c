use crate::error::{Result, TradeMapError};
use crate::geo::{GeoCountry, LineString};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Parse a GeoJSON file with simd-json
fn read_geojson(path: &Path) -> Result<GeoJson> {
    let mut bytes = fs::read(path)?;
    let geojson: GeoJson = simd_json::serde::from_slice(&mut bytes)?;
    Ok(geojson)
}

/// Load per-country polygons keyed by ISO alpha-2 code.
///
/// Features without geometry or without a non-empty ISO code are dropped. Codes
/// are upper-cased and trimmed; duplicates are kept as-is.
pub fn load_countries(path: &Path, iso_key: &str, name_key: &str) -> Result<Vec<GeoCountry>> {
    let GeoJson::FeatureCollection(fc) = read_geojson(path)? else {
        return Err(TradeMapError::Config {
            message: format!("{} is not a FeatureCollection", path.display()),
        });
    };

    let total = fc.features.len();
    let mut countries = Vec::with_capacity(total);

    for feature in fc.features {
        let iso_a2 = feature
            .property(iso_key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty());
        let Some(iso_a2) = iso_a2 else {
            continue;
        };

        let name = feature
            .property(name_key)
            .and_then(|v| v.as_str())
            .unwrap_or(&iso_a2)
            .to_string();

        let Some(geometry) = feature.geometry.as_ref() else {
            continue;
        };
        let mut polygons = Vec::new();
        collect_exteriors(geometry, &mut |ring| polygons.push(ring));
        if polygons.is_empty() {
            debug!(iso = %iso_a2, "feature has no polygon geometry");
            continue;
        }

        countries.push(GeoCountry {
            iso_a2,
            name,
            polygons,
        });
    }

    info!(
        path = %path.display(),
        features = total,
        countries = countries.len(),
        "loaded country polygons"
    );
    Ok(countries)
}

/// Load coastline (or any line) GeoJSON data as plain lines
pub fn load_coastlines(path: &Path) -> Result<Vec<LineString>> {
    let geojson = read_geojson(path)?;
    let mut lines = Vec::new();
    process_geojson_lines(&geojson, |line| lines.push(line));
    info!(path = %path.display(), lines = lines.len(), "loaded coastlines");
    Ok(lines)
}

/// Process GeoJSON and extract line features
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| (c[0], c[1]))
        .collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        Value::Polygon(_) | Value::MultiPolygon(_) => collect_exteriors(geometry, add_line),
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

/// Exterior rings of every polygon in the geometry; holes are ignored
fn collect_exteriors<F>(geometry: &Geometry, add_ring: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_ring(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_ring(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_exteriors(g, add_ring);
            }
        }
        _ => {}
    }
}
