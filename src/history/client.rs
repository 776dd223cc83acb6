//! Client for the CPCB historical data repository: the states/cities/stations
//! directory, yearly archive lookups, and the Raw_data CSV store.

use crate::history::error::HistoryError;
use crate::transport::{Transport, BASE_URL};
use crate::types::archive::{ArchiveFrequency, ArchiveScope};
use bon::Builder;
use log::info;
use polars::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::task;

const STATION_LIST_URL_PATH: &str = "/dataRepository/all_india_stationlist";
const FILE_PATH_URL_PATH: &str = "/dataRepository/file_Path";
const DOWNLOAD_URL_PATH: &str = "/dataRepository/download_file?file_name=";

/// One dropdown option from the repository directory: an opaque `value`
/// (identifier) and a display `label`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryEntry {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

/// The repository's dropdown directory: states to cities, cities to stations.
#[derive(Debug, Default, Deserialize)]
pub struct StationDirectory {
    #[serde(default)]
    pub cities: HashMap<String, Vec<DirectoryEntry>>,
    #[serde(default)]
    pub stations: HashMap<String, Vec<DirectoryEntry>>,
}

impl StationDirectory {
    /// State names with historical data, sorted.
    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self.cities.keys().map(String::as_str).collect();
        states.sort_unstable();
        states
    }

    /// City names in a state, sorted. `None` for an unknown state.
    pub fn cities_in(&self, state: &str) -> Option<Vec<&str>> {
        let entries = self.cities.get(state)?;
        let mut names: Vec<&str> = entries.iter().map(|e| e.value.as_str()).collect();
        names.sort_unstable();
        Some(names)
    }

    /// Stations in a city, sorted by label. `None` for an unknown city.
    pub fn stations_in(&self, city: &str) -> Option<Vec<&DirectoryEntry>> {
        let entries = self.stations.get(city)?;
        let mut stations: Vec<&DirectoryEntry> = entries.iter().collect();
        stations.sort_by(|a, b| a.label.cmp(&b.label));
        Some(stations)
    }

    /// Resolves a station ID to its display label, scanning every city.
    pub fn station_name(&self, station_id: &str) -> Option<&str> {
        self.stations
            .values()
            .flatten()
            .find(|e| e.value == station_id)
            .map(|e| e.label.as_str())
    }
}

/// One yearly archive as reported by the `file_Path` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveFile {
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub filepath: String,
}

impl ArchiveFile {
    /// Absolute download URL for this archive.
    pub fn url(&self) -> String {
        format!("{BASE_URL}{DOWNLOAD_URL_PATH}{}", self.filepath)
    }

    /// The archive's own file name (last path segment).
    pub fn file_name(&self) -> &str {
        self.filepath.rsplit('/').next().unwrap_or(&self.filepath)
    }
}

/// Parameters for a `file_Path` archive lookup. Fields the repository does
/// not need for a given scope are sent as empty strings, matching the portal.
#[derive(Debug, Clone, Builder)]
pub struct ArchiveQuery {
    #[builder(into)]
    pub station_id: Option<String>,
    #[builder(into)]
    pub station_name: Option<String>,
    #[builder(into)]
    pub state: Option<String>,
    #[builder(into)]
    pub city: Option<String>,
    #[builder(into)]
    pub year: Option<String>,
    pub frequency: ArchiveFrequency,
    pub scope: ArchiveScope,
}

impl ArchiveQuery {
    fn payload(&self) -> Value {
        json!({
            "station_id": self.station_id.as_deref().unwrap_or(""),
            "station_name": self.station_name.as_deref().unwrap_or(""),
            "state": self.state.as_deref().unwrap_or(""),
            "city": self.city.as_deref().unwrap_or(""),
            "year": self.year.as_deref().unwrap_or(""),
            "frequency": self.frequency.request_token(),
            "dataType": self.scope.request_token(),
        })
    }
}

/// Parameters for a Raw_data CSV download.
#[derive(Debug, Clone, Builder)]
pub struct RawDataRequest {
    #[builder(into)]
    pub site_id: String,
    #[builder(into)]
    pub station_name: String,
    /// Sampling period segment of the store layout, e.g. "15Min".
    #[builder(into, default = "15Min".to_string())]
    pub period: String,
    #[builder(into)]
    pub year: String,
}

impl RawDataRequest {
    /// URL of the CSV in the Raw_data store:
    /// `.../download_file?file_name=Raw_data/<period>/<year>/<site>_<name>_<period>.csv`.
    pub fn url(&self) -> String {
        let station = clean_station_name(&self.station_name);
        format!(
            "{BASE_URL}{DOWNLOAD_URL_PATH}Raw_data/{period}/{year}/{site}_{station}_{period}.csv",
            period = self.period,
            year = self.year,
            site = self.site_id,
        )
    }

    fn default_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            self.site_id,
            clean_station_name(&self.station_name),
            self.period,
            self.year
        )
    }
}

pub struct HistoryClient {
    transport: Arc<Transport>,
}

impl HistoryClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Fetches the full states/cities/stations directory.
    pub async fn directory(&self) -> Result<StationDirectory, HistoryError> {
        let url = format!("{BASE_URL}{STATION_LIST_URL_PATH}");
        let response = self.transport.post_envelope(&url, &json!({})).await?;
        let response = check_status(response)?;
        match response.get("dropdown") {
            Some(dropdown) => Ok(serde_json::from_value(dropdown.clone())?),
            None => Ok(StationDirectory::default()),
        }
    }

    /// Looks up the yearly archives matching a query.
    pub async fn archive_files(&self, query: &ArchiveQuery) -> Result<Vec<ArchiveFile>, HistoryError> {
        let url = format!("{BASE_URL}{FILE_PATH_URL_PATH}");
        let response = self.transport.post_envelope(&url, &query.payload()).await?;
        let response = check_status(response)?;

        let Some(entries) = response.get("data").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        // The repository mixes the odd non-object entry into the list.
        Ok(entries
            .iter()
            .filter(|e| e.is_object())
            .filter_map(|e| serde_json::from_value(e.clone()).ok())
            .collect())
    }

    /// Finds the city-level daily archive for one year.
    pub async fn city_archive(&self, city: &str, year: &str) -> Result<ArchiveFile, HistoryError> {
        let query = ArchiveQuery::builder()
            .city(city)
            .frequency(ArchiveFrequency::Daily)
            .scope(ArchiveScope::CityLevel)
            .build();
        let files = self.archive_files(&query).await?;
        files
            .into_iter()
            .find(|f| f.year == year)
            .ok_or_else(|| HistoryError::ArchiveNotFound {
                subject: format!("city '{city}'"),
                year: year.to_string(),
            })
    }

    /// Finds the station-level daily archive for one year. The station name
    /// required by the endpoint is resolved from the directory.
    pub async fn station_archive(
        &self,
        station_id: &str,
        year: &str,
    ) -> Result<ArchiveFile, HistoryError> {
        let directory = self.directory().await?;
        let station_name = directory
            .station_name(station_id)
            .ok_or_else(|| HistoryError::UnknownStation(station_id.to_string()))?;

        let query = ArchiveQuery::builder()
            .station_id(station_id)
            .station_name(station_name)
            .frequency(ArchiveFrequency::Daily)
            .scope(ArchiveScope::StationLevel)
            .build();
        let files = self.archive_files(&query).await?;
        files
            .into_iter()
            .find(|f| f.year == year)
            .ok_or_else(|| HistoryError::ArchiveNotFound {
                subject: format!("station '{station_id}'"),
                year: year.to_string(),
            })
    }

    /// Downloads an archive into `dest_dir`, keeping its repository file
    /// name. Returns the written path.
    pub async fn download_archive(
        &self,
        file: &ArchiveFile,
        dest_dir: &Path,
    ) -> Result<PathBuf, HistoryError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| HistoryError::FileIo(dest_dir.to_path_buf(), e))?;
        let dest = dest_dir.join(file.file_name());
        self.transport.download_to(&file.url(), &dest).await?;
        Ok(dest)
    }

    /// Downloads a Raw_data CSV into `dest_dir` and returns the written path.
    pub async fn download_raw_data(
        &self,
        request: &RawDataRequest,
        dest_dir: &Path,
    ) -> Result<PathBuf, HistoryError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| HistoryError::FileIo(dest_dir.to_path_buf(), e))?;
        let dest = dest_dir.join(request.default_file_name());
        self.transport.download_to(&request.url(), &dest).await?;
        info!("saved raw data to {}", dest.display());
        Ok(dest)
    }

    /// Downloads a Raw_data CSV and parses it into a `DataFrame`.
    pub async fn raw_data_frame(&self, request: &RawDataRequest) -> Result<DataFrame, HistoryError> {
        let bytes = self.transport.get_bytes(&request.url()).await?;
        let station = request.site_id.clone();
        csv_to_dataframe(bytes, station).await
    }
}

fn check_status(response: Value) -> Result<Value, HistoryError> {
    let status = response
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("missing")
        .to_string();
    if status == "success" {
        Ok(response)
    } else {
        Err(HistoryError::RepositoryStatus(status))
    }
}

/// Parses raw CSV bytes into a `DataFrame` on a blocking task. The reader
/// wants a file path, so the bytes go through a named temp file.
async fn csv_to_dataframe(bytes: Vec<u8>, station: String) -> Result<DataFrame, HistoryError> {
    task::spawn_blocking(move || {
        let mut temp_file = NamedTempFile::new().map_err(|e| HistoryError::CsvIo {
            station: station.clone(),
            source: e,
        })?;
        temp_file.write_all(&bytes).map_err(|e| HistoryError::CsvIo {
            station: station.clone(),
            source: e,
        })?;
        temp_file.flush().map_err(|e| HistoryError::CsvIo {
            station: station.clone(),
            source: e,
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(temp_file.path().to_path_buf()))
            .map_err(|e| HistoryError::CsvParse {
                station: station.clone(),
                source: e,
            })?
            .finish()
            .map_err(|e| HistoryError::CsvParse {
                station,
                source: e,
            })
    })
    .await?
}

/// Normalizes a station display name to the underscore form the Raw_data
/// store uses. Dots vanish ("Dr." becomes "Dr"), every other punctuation run
/// becomes a single underscore.
pub fn clean_station_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            cleaned.push(c);
        } else if c != '.' {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_station_name_handles_portal_patterns() {
        assert_eq!(
            clean_station_name("Dr. Karni Singh Shooting Range, Delhi - DPCC"),
            "Dr_Karni_Singh_Shooting_Range_Delhi_DPCC"
        );
        assert_eq!(clean_station_name("ITO, Delhi - DPCC"), "ITO_Delhi_DPCC");
        assert_eq!(clean_station_name("  Sector-25, Chandigarh "), "Sector_25_Chandigarh");
        assert_eq!(clean_station_name(""), "");
    }

    #[test]
    fn raw_data_request_builds_store_url() {
        let request = RawDataRequest::builder()
            .site_id("site_5964")
            .station_name("Punjabi Bagh, Delhi - DPCC")
            .year("2024")
            .build();
        assert_eq!(request.period, "15Min");
        assert_eq!(
            request.url(),
            "https://airquality.cpcb.gov.in/dataRepository/download_file?file_name=Raw_data/15Min/2024/site_5964_Punjabi_Bagh_Delhi_DPCC_15Min.csv"
        );
        assert_eq!(
            request.default_file_name(),
            "site_5964_Punjabi_Bagh_Delhi_DPCC_15Min_2024.csv"
        );
    }

    #[test]
    fn archive_query_payload_fills_blanks() {
        let query = ArchiveQuery::builder()
            .city("Mumbai")
            .frequency(ArchiveFrequency::Daily)
            .scope(ArchiveScope::CityLevel)
            .build();
        let payload = query.payload();
        assert_eq!(payload["city"], "Mumbai");
        assert_eq!(payload["station_id"], "");
        assert_eq!(payload["frequency"], "daily");
        assert_eq!(payload["dataType"], "cityLevel");
    }

    #[test]
    fn archive_file_url_and_name() {
        let file = ArchiveFile {
            year: "2023".to_string(),
            filepath: "AQI/cityLevel/daily/2023/Mumbai_2023.xlsx".to_string(),
        };
        assert_eq!(file.file_name(), "Mumbai_2023.xlsx");
        assert!(file
            .url()
            .starts_with("https://airquality.cpcb.gov.in/dataRepository/download_file?file_name=AQI/"));
    }

    #[test]
    fn directory_views_sort_and_resolve() {
        let directory: StationDirectory = serde_json::from_value(json!({
            "cities": {
                "Maharashtra": [
                    {"value": "Pune", "label": "Pune"},
                    {"value": "Mumbai", "label": "Mumbai"}
                ]
            },
            "stations": {
                "Mumbai": [
                    {"value": "site_2", "label": "Worli"},
                    {"value": "site_1", "label": "Bandra"}
                ]
            }
        }))
        .unwrap();

        assert_eq!(directory.states(), ["Maharashtra"]);
        assert_eq!(directory.cities_in("Maharashtra").unwrap(), ["Mumbai", "Pune"]);
        assert!(directory.cities_in("Kerala").is_none());

        let stations = directory.stations_in("Mumbai").unwrap();
        let labels: Vec<&str> = stations.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Bandra", "Worli"]);

        assert_eq!(directory.station_name("site_1"), Some("Bandra"));
        assert_eq!(directory.station_name("site_99"), None);
    }

    #[test]
    fn check_status_rejects_failures() {
        assert!(check_status(json!({"status": "success"})).is_ok());
        assert!(matches!(
            check_status(json!({"status": "error"})),
            Err(HistoryError::RepositoryStatus(s)) if s == "error"
        ));
        assert!(matches!(
            check_status(json!({})),
            Err(HistoryError::RepositoryStatus(s)) if s == "missing"
        ));
    }
}
