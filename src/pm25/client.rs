//! Client for the WUSTL ACAG satellite-derived PM2.5 rasters: cached NetCDF
//! downloads from AWS and polygon-clipped statistics.

use crate::pm25::clip::{self, GeoFeature, Pm25Stats};
use crate::pm25::error::Pm25Error;
use crate::transport::Transport;
use geo::Geometry;
use log::{info, warn};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;

const AWS_BASE_URL: &str = "https://s3.us-west-2.amazonaws.com/v6.gl.02.04/V6.GL.02.04/GL";

/// Anything smaller than this is assumed to be a truncated download; the
/// global rasters are hundreds of megabytes.
const MIN_PLAUSIBLE_BYTES: u64 = 1024 * 1024;

/// File name of the global raster for a year, or for one month of it.
pub fn netcdf_filename(year: i32, month: Option<u32>) -> String {
    match month {
        None => format!("V6GL02.04.CNNPM25.GL.{year}01-{year}12.nc"),
        Some(month) => format!("V6GL02.04.CNNPM25.GL.{year}{month:02}-{year}{month:02}.nc"),
    }
}

/// Download URL on the ACAG S3 bucket for a year or month.
pub fn netcdf_url(year: i32, month: Option<u32>) -> String {
    let filename = netcdf_filename(year, month);
    match month {
        None => format!("{AWS_BASE_URL}/Annual/{filename}"),
        Some(_) => format!("{AWS_BASE_URL}/Monthly/{year}/{filename}"),
    }
}

pub struct Pm25Client {
    transport: Arc<Transport>,
    cache_dir: PathBuf,
}

impl Pm25Client {
    pub fn new(transport: Arc<Transport>, cache_dir: PathBuf) -> Self {
        Self {
            transport,
            cache_dir,
        }
    }

    /// Where the raster for this year/month lives in the cache, whether or
    /// not it has been downloaded yet.
    pub fn netcdf_path(&self, year: i32, month: Option<u32>) -> PathBuf {
        self.cache_dir.join(netcdf_filename(year, month))
    }

    /// Returns the cached raster path, downloading it first if it is missing,
    /// truncated, or `force` is set. Partial downloads never land on the
    /// final path; the stream goes to a sibling `.part` file that is renamed
    /// into place once complete.
    pub async fn ensure_netcdf(
        &self,
        year: i32,
        month: Option<u32>,
        force: bool,
    ) -> Result<PathBuf, Pm25Error> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Pm25Error::CacheDirCreation(self.cache_dir.clone(), e))?;

        let path = self.netcdf_path(year, month);
        if !force {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                if metadata.len() >= MIN_PLAUSIBLE_BYTES {
                    info!("using cached raster {}", path.display());
                    return Ok(path);
                }
                warn!(
                    "cached raster {} looks incomplete ({} bytes); re-downloading",
                    path.display(),
                    metadata.len()
                );
            }
        }

        let url = netcdf_url(year, month);
        let partial = path.with_extension("nc.part");
        if let Err(e) = self.transport.download_to(&url, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| Pm25Error::CacheIo(path.clone(), e))?;
        Ok(path)
    }

    /// Statistics over the raster cells inside the polygons of a GeoJSON
    /// file, all features combined. The raster is downloaded on first use.
    pub async fn polygon_stats(
        &self,
        geojson_path: &Path,
        year: i32,
        month: Option<u32>,
    ) -> Result<Pm25Stats, Pm25Error> {
        let features = self.load_features(geojson_path).await?;
        let rect = clip::combined_bounding_rect(&features).ok_or(Pm25Error::NoPolygons)?;
        let raster = self.ensure_netcdf(year, month, false).await?;

        let geometries: Vec<Geometry<f64>> = features.into_iter().map(|f| f.geometry).collect();
        task::spawn_blocking(move || {
            let window = clip::read_window(&raster, rect)?;
            clip::grid_stats(&window, &geometries).ok_or(Pm25Error::NoCellsInPolygon)
        })
        .await?
    }

    /// Per-group statistics as a `DataFrame`: one row per unique value of
    /// `group_key` (features sharing a value are clipped together), or one
    /// row per feature when no key is given. Groups whose polygons cover no
    /// valid cells get null statistics rather than failing the whole frame.
    pub async fn feature_stats(
        &self,
        geojson_path: &Path,
        year: i32,
        month: Option<u32>,
        group_key: Option<&str>,
    ) -> Result<DataFrame, Pm25Error> {
        let features = self.load_features(geojson_path).await?;
        let rect = clip::combined_bounding_rect(&features).ok_or(Pm25Error::NoPolygons)?;
        let raster = self.ensure_netcdf(year, month, false).await?;

        let groups = group_features(features, group_key)?;
        let label_column = group_key.unwrap_or("name").to_string();

        task::spawn_blocking(move || {
            let window = clip::read_window(&raster, rect)?;

            let mut labels = Vec::with_capacity(groups.len());
            let mut mean: Vec<Option<f64>> = Vec::with_capacity(groups.len());
            let mut std: Vec<Option<f64>> = Vec::with_capacity(groups.len());
            let mut min: Vec<Option<f64>> = Vec::with_capacity(groups.len());
            let mut max: Vec<Option<f64>> = Vec::with_capacity(groups.len());
            let mut count = Vec::with_capacity(groups.len());

            for (label, geometries) in groups {
                let stats = clip::grid_stats(&window, &geometries);
                labels.push(label);
                mean.push(stats.map(|s| s.mean));
                std.push(stats.map(|s| s.std));
                min.push(stats.map(|s| s.min));
                max.push(stats.map(|s| s.max));
                count.push(stats.map_or(0u32, |s| s.count as u32));
            }

            Ok(df!(
                label_column.as_str() => labels,
                "mean" => mean,
                "std" => std,
                "min" => min,
                "max" => max,
                "count" => count,
            )?)
        })
        .await?
    }

    /// Lists the rasters currently in the cache.
    pub async fn cached_files(&self) -> Result<Vec<PathBuf>, Pm25Error> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(Pm25Error::CacheIo(self.cache_dir.clone(), e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Pm25Error::CacheIo(self.cache_dir.clone(), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "nc") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Deletes every cached raster.
    pub async fn clear_cache(&self) -> Result<(), Pm25Error> {
        for path in self.cached_files().await? {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| Pm25Error::CacheIo(path.clone(), e))?;
            info!("removed cached raster {}", path.display());
        }
        Ok(())
    }

    async fn load_features(&self, geojson_path: &Path) -> Result<Vec<GeoFeature>, Pm25Error> {
        let raw = tokio::fs::read_to_string(geojson_path)
            .await
            .map_err(|e| Pm25Error::GeoJsonRead(geojson_path.to_path_buf(), e))?;
        let features = clip::parse_features(&raw)?;
        if features.is_empty() {
            return Err(Pm25Error::NoPolygons);
        }
        Ok(features)
    }
}

/// Buckets features by the string value of `group_key`, or labels each
/// feature individually (by its `name`, `NAME_1`, or index) when no key is
/// given. A missing group key on any feature is an error; an absent name on
/// ungrouped features just falls back to the index.
fn group_features(
    features: Vec<GeoFeature>,
    group_key: Option<&str>,
) -> Result<Vec<(String, Vec<Geometry<f64>>)>, Pm25Error> {
    match group_key {
        Some(key) => {
            let mut groups: BTreeMap<String, Vec<Geometry<f64>>> = BTreeMap::new();
            for feature in features {
                let label = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get(key))
                    .map(property_label)
                    .ok_or_else(|| Pm25Error::MissingProperty(key.to_string()))?;
                groups.entry(label).or_default().push(feature.geometry);
            }
            Ok(groups.into_iter().collect())
        }
        None => Ok(features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| {
                let label = feature
                    .properties
                    .as_ref()
                    .and_then(|p| p.get("name").or_else(|| p.get("NAME_1")))
                    .map(property_label)
                    .unwrap_or_else(|| i.to_string());
                (label, vec![feature.geometry])
            })
            .collect()),
    }
}

fn property_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pm25::clip::parse_features;

    #[test]
    fn annual_filename_and_url() {
        assert_eq!(
            netcdf_filename(2019, None),
            "V6GL02.04.CNNPM25.GL.201901-201912.nc"
        );
        assert_eq!(
            netcdf_url(2019, None),
            "https://s3.us-west-2.amazonaws.com/v6.gl.02.04/V6.GL.02.04/GL/Annual/V6GL02.04.CNNPM25.GL.201901-201912.nc"
        );
    }

    #[test]
    fn monthly_filename_and_url() {
        assert_eq!(
            netcdf_filename(2019, Some(2)),
            "V6GL02.04.CNNPM25.GL.201902-201902.nc"
        );
        assert_eq!(
            netcdf_url(2019, Some(11)),
            "https://s3.us-west-2.amazonaws.com/v6.gl.02.04/V6.GL.02.04/GL/Monthly/2019/V6GL02.04.CNNPM25.GL.201911-201911.nc"
        );
    }

    #[test]
    fn cache_path_is_under_the_cache_dir() {
        let transport = Arc::new(Transport::new().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let client = Pm25Client::new(transport, dir.path().to_path_buf());
        let path = client.netcdf_path(2021, Some(6));
        assert!(path.starts_with(dir.path()));
        assert!(path
            .file_name()
            .is_some_and(|n| n == "V6GL02.04.CNNPM25.GL.202106-202106.nc"));
    }

    const TWO_STATES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "d1", "state_name": "A"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"name": "d2", "state_name": "A"},
             "geometry": {"type": "Polygon", "coordinates": [[[1,0],[2,0],[2,1],[1,1],[1,0]]]}},
            {"type": "Feature", "properties": {"name": "d3", "state_name": "B"},
             "geometry": {"type": "Polygon", "coordinates": [[[5,5],[6,5],[6,6],[5,6],[5,5]]]}}
        ]
    }"#;

    #[test]
    fn grouping_by_key_merges_features() {
        let features = parse_features(TWO_STATES).unwrap();
        let groups = group_features(features, Some("state_name")).unwrap();
        let labels: Vec<&str> = groups.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["A", "B"]);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn grouping_without_key_labels_each_feature() {
        let features = parse_features(TWO_STATES).unwrap();
        let groups = group_features(features, None).unwrap();
        let labels: Vec<&str> = groups.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, ["d1", "d2", "d3"]);
    }

    #[test]
    fn grouping_by_unknown_key_is_an_error() {
        let features = parse_features(TWO_STATES).unwrap();
        assert!(matches!(
            group_features(features, Some("district")),
            Err(Pm25Error::MissingProperty(key)) if key == "district"
        ));
    }
}
