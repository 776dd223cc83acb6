//! Live per-station AQI readings from the dashboard's parameters endpoint,
//! plus IP-based geolocation for "near me" queries.
//!
//! The endpoint returns a `metrics` table (one row per pollutant) and a
//! `chartData` matrix holding the last hours of readings as position-aligned
//! series. The matrix is cleaned into named series here; rows with missing
//! timestamps or values are dropped.

use crate::live::error::LiveError;
use crate::transport::{Transport, BASE_URL};
use crate::types::station::lenient_f64;
use chrono::{NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const PARAMETERS_URL_PATH: &str = "/aqi_dashboard/aqi_all_Parameters";
const GEOLOCATE_URL: &str = "http://ip-api.com/json";

/// One pollutant row from the live `metrics` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutantMetric {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub max: Option<f64>,
    /// Averaging period description, e.g. "24 Hrs".
    #[serde(rename = "avgDesc", default)]
    pub avg_desc: String,
}

/// One timestamped reading from a cleaned chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: String,
    pub val: f64,
}

/// A pollutant's recent readings, recovered from the chart matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutantSeries {
    pub name: String,
    pub points: Vec<SeriesPoint>,
}

/// Live AQI data for one station at one timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub station_id: String,
    pub metrics: Vec<PollutantMetric>,
    pub last_hours: Vec<PollutantSeries>,
}

pub struct LiveClient {
    transport: Arc<Transport>,
}

impl LiveClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Fetches the live reading for `station_id` at `timestamp`
    /// (`YYYY-MM-DDTHH:00:00Z`, see [`hour_stamp`]).
    pub async fn snapshot(
        &self,
        station_id: &str,
        timestamp: &str,
    ) -> Result<LiveSnapshot, LiveError> {
        let url = format!("{BASE_URL}{PARAMETERS_URL_PATH}");
        let payload = json!({"station_id": station_id, "date": timestamp});
        let response = self.transport.post_envelope(&url, &payload).await?;

        let metrics: Vec<PollutantMetric> = match response.get("metrics") {
            Some(metrics) => serde_json::from_value(metrics.clone())?,
            None => Vec::new(),
        };
        let last_hours = clean_chart_data(&response, &metrics);

        Ok(LiveSnapshot {
            station_id: station_id.to_string(),
            metrics,
            last_hours,
        })
    }

    /// Resolves the machine's approximate coordinates from its public IP.
    pub async fn system_location(&self) -> Result<(f64, f64), LiveError> {
        let response = self.transport.get_json(GEOLOCATE_URL).await?;
        if response.get("status").and_then(Value::as_str) == Some("success") {
            let lat = response.get("lat").and_then(Value::as_f64);
            let lon = response.get("lon").and_then(Value::as_f64);
            if let (Some(lat), Some(lon)) = (lat, lon) {
                return Ok((lat, lon));
            }
        }
        let message = response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no coordinates in response")
            .to_string();
        Err(LiveError::Geolocation(message))
    }
}

/// Formats the timestamp the parameters endpoint expects. Readings are
/// published on whole hours only.
pub fn hour_stamp(date: NaiveDate, hour: u32) -> Result<String, LiveError> {
    if hour > 23 {
        return Err(LiveError::InvalidHour(hour));
    }
    Ok(format!("{}T{:02}:00:00Z", date.format("%Y-%m-%d"), hour))
}

/// The stamp for the most recent whole hour, UTC.
pub fn current_hour_stamp() -> String {
    let now = Utc::now();
    // Hour comes from the same instant as the date, so this cannot be out of range.
    format!("{}T{:02}:00:00Z", now.format("%Y-%m-%d"), now.hour())
}

/// Recovers named series from the raw `chartData` matrix. Each series is a
/// list of rows whose first row is a header; rows shorter than two columns or
/// with null entries are dropped. Series names come from the position-aligned
/// `metrics` table; series beyond it are ignored.
pub fn clean_chart_data(response: &Value, metrics: &[PollutantMetric]) -> Vec<PollutantSeries> {
    let Some(chart_data) = response.get("chartData").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut series_out = Vec::new();
    for (i, series) in chart_data.iter().enumerate() {
        let Some(rows) = series.as_array() else {
            continue;
        };
        if rows.len() < 2 {
            continue;
        }
        let Some(metric) = metrics.get(i) else {
            continue;
        };

        let points = rows[1..]
            .iter()
            .filter_map(|row| {
                let row = row.as_array()?;
                if row.len() < 2 {
                    return None;
                }
                let date = row[0].as_str()?.to_string();
                let val = value_as_f64(&row[1])?;
                Some(SeriesPoint { date, val })
            })
            .collect();

        series_out.push(PollutantSeries {
            name: metric.name.clone(),
            points,
        });
    }
    series_out
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
