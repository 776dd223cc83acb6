//! Raster-side of the PM2.5 statistics: reading a window of the global grid
//! out of a NetCDF file and clipping it against polygons.
//!
//! The WUSTL files come in two vintages (`PM25` vs `GWRPM25` variable names,
//! `lat`/`lon` vs `latitude`/`longitude` axes, ascending or descending axis
//! order); all four combinations are handled here.

use crate::pm25::error::Pm25Error;
use geo::{coord, BoundingRect, Contains, Geometry, Point, Rect};
use geojson::GeoJson;
use std::ops::Range;
use std::path::Path;

/// Degrees of slack added around the polygon bounding box before windowing
/// the grid, so boundary cells are not lost to the subset.
const BUFFER_DEG: f64 = 0.1;

const VARIABLE_NAMES: [&str; 2] = ["PM25", "GWRPM25"];
const LAT_NAMES: [&str; 2] = ["latitude", "lat"];
const LON_NAMES: [&str; 2] = ["longitude", "lon"];

/// Summary statistics over the clipped cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pm25Stats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// One GeoJSON feature, converted to geo types.
pub struct GeoFeature {
    pub properties: Option<geojson::JsonObject>,
    pub geometry: Geometry<f64>,
}

/// Parses GeoJSON text into features. A bare geometry or single feature
/// becomes a one-element list.
pub(crate) fn parse_features(raw: &str) -> Result<Vec<GeoFeature>, Pm25Error> {
    let geojson: GeoJson = raw.parse()?;
    let mut features = Vec::new();

    let mut push = |properties: Option<geojson::JsonObject>,
                    geometry: Option<&geojson::Geometry>|
     -> Result<(), Pm25Error> {
        if let Some(geometry) = geometry {
            features.push(GeoFeature {
                properties,
                geometry: Geometry::<f64>::try_from(geometry)?,
            });
        }
        Ok(())
    };

    match geojson {
        GeoJson::FeatureCollection(collection) => {
            for feature in collection.features {
                push(feature.properties, feature.geometry.as_ref())?;
            }
        }
        GeoJson::Feature(feature) => push(feature.properties, feature.geometry.as_ref())?,
        GeoJson::Geometry(geometry) => push(None, Some(&geometry))?,
    }

    Ok(features)
}

/// The bounding rectangle covering every feature.
pub(crate) fn combined_bounding_rect(features: &[GeoFeature]) -> Option<Rect<f64>> {
    let mut combined: Option<Rect<f64>> = None;
    for feature in features {
        let Some(rect) = feature.geometry.bounding_rect() else {
            continue;
        };
        combined = Some(match combined {
            None => rect,
            Some(acc) => Rect::new(
                coord! { x: acc.min().x.min(rect.min().x), y: acc.min().y.min(rect.min().y) },
                coord! { x: acc.max().x.max(rect.max().x), y: acc.max().y.max(rect.max().y) },
            ),
        });
    }
    combined
}

/// A rectangular window of the PM2.5 grid, values row-major over
/// `lats x lons`, with fill values already mapped to NaN.
pub(crate) struct GridWindow {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub values: Vec<f64>,
}

/// Reads the grid cells covering `rect` (plus the buffer) from a NetCDF file.
pub(crate) fn read_window(path: &Path, rect: Rect<f64>) -> Result<GridWindow, Pm25Error> {
    let file = netcdf::open(path)?;

    let var = VARIABLE_NAMES
        .iter()
        .find_map(|name| file.variable(name))
        .ok_or_else(|| Pm25Error::VariableNotFound {
            available: file
                .variables()
                .map(|v| v.name().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let lat_name = LAT_NAMES
        .iter()
        .copied()
        .find(|name| file.variable(name).is_some())
        .ok_or(Pm25Error::CoordinatesNotFound)?;
    let lon_name = LON_NAMES
        .iter()
        .copied()
        .find(|name| file.variable(name).is_some())
        .ok_or(Pm25Error::CoordinatesNotFound)?;

    let lats: Vec<f64> = file
        .variable(lat_name)
        .ok_or(Pm25Error::CoordinatesNotFound)?
        .get_values(..)?;
    let lons: Vec<f64> = file
        .variable(lon_name)
        .ok_or(Pm25Error::CoordinatesNotFound)?
        .get_values(..)?;

    let lat_window = index_window(&lats, rect.min().y - BUFFER_DEG, rect.max().y + BUFFER_DEG)
        .ok_or(Pm25Error::NoCellsInPolygon)?;
    let lon_window = index_window(&lons, rect.min().x - BUFFER_DEG, rect.max().x + BUFFER_DEG)
        .ok_or(Pm25Error::NoCellsInPolygon)?;

    let dims = var.dimensions();
    if dims.len() != 2 {
        return Err(Pm25Error::UnsupportedShape(dims.len()));
    }
    let lat_first = dims[0].name() == lat_name;

    let n_lat = lat_window.len();
    let n_lon = lon_window.len();
    let values: Vec<f64> = if lat_first {
        var.get_values((lat_window.clone(), lon_window.clone()))?
    } else {
        transpose(
            var.get_values((lon_window.clone(), lat_window.clone()))?,
            n_lon,
            n_lat,
        )
    };

    let fill_value = fill_value(&var);
    let values = values
        .into_iter()
        .map(|v| match fill_value {
            Some(fill) if v == fill => f64::NAN,
            _ => v,
        })
        .collect();

    Ok(GridWindow {
        lats: lats[lat_window].to_vec(),
        lons: lons[lon_window].to_vec(),
        values,
    })
}

fn fill_value(var: &netcdf::Variable<'_>) -> Option<f64> {
    let attribute = var.attribute("_FillValue")?;
    match attribute.value().ok()? {
        netcdf::AttributeValue::Float(v) => Some(v as f64),
        netcdf::AttributeValue::Double(v) => Some(v),
        _ => None,
    }
}

/// Index range of axis entries within `[lo, hi]`. The axis is monotonic in
/// either direction, so the in-range entries are contiguous.
fn index_window(axis: &[f64], lo: f64, hi: f64) -> Option<Range<usize>> {
    let mut first = None;
    let mut last = None;
    for (i, v) in axis.iter().enumerate() {
        if (lo..=hi).contains(v) {
            if first.is_none() {
                first = Some(i);
            }
            last = Some(i);
        }
    }
    Some(first?..last? + 1)
}

fn transpose(values: Vec<f64>, rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = values[r * cols + c];
        }
    }
    out
}

/// Statistics over the window cells whose centers fall inside any of the
/// given geometries, ignoring NaN cells. `None` when nothing is inside.
pub(crate) fn grid_stats(window: &GridWindow, geometries: &[Geometry<f64>]) -> Option<Pm25Stats> {
    let n_lon = window.lons.len();
    let mut values = Vec::new();

    for (i, &lat) in window.lats.iter().enumerate() {
        for (j, &lon) in window.lons.iter().enumerate() {
            let value = window.values[i * n_lon + j];
            if !value.is_finite() {
                continue;
            }
            let center = Point::new(lon, lat);
            if geometries.iter().any(|g| g.contains(&center)) {
                values.push(value);
            }
        }
    }

    stats_of(&values)
}

pub(crate) fn stats_of(values: &[f64]) -> Option<Pm25Stats> {
    if values.is_empty() {
        return None;
    }
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Pm25Stats {
        mean,
        std: variance.sqrt(),
        min,
        max,
        count,
    })
}
