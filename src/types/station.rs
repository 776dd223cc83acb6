//! Data structures for the CPCB all-India station feed: cities, the stations
//! they group, and the lenient parsing the feed requires (coordinates arrive
//! as numbers, numeric strings, empty strings, or not at all).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One monitoring station as reported by the live dashboard feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Opaque station identifier (e.g. "site_5964"). Unique per station.
    #[serde(default)]
    pub id: String,
    /// Display name; not guaranteed unique.
    #[serde(default)]
    pub name: String,
    /// Latitude in decimal degrees, when the feed supplies a usable value.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, when the feed supplies a usable value.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    /// Whether the station is currently reporting.
    #[serde(default)]
    pub live: bool,
    /// Current average AQI, absent when no live reading exists.
    #[serde(rename = "avg", default, deserialize_with = "lenient_f64")]
    pub avg_aqi: Option<f64>,
}

impl Station {
    /// Returns `(latitude, longitude)` when both coordinates are present and
    /// finite. Stations without usable coordinates are excluded from every
    /// distance search.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// A city grouping from the feed. The grouping carries no weight for distance
/// search; the locator flattens all cities into one search space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    #[serde(rename = "cityName", default)]
    pub name: String,
    #[serde(rename = "cityID", default)]
    pub id: String,
    #[serde(rename = "stateID", default)]
    pub state_id: String,
    #[serde(rename = "stationsInCity", default)]
    pub stations: Vec<Station>,
}

impl City {
    /// Fraction of this city's stations that are live, in `[0, 1]`.
    pub fn live_fraction(&self) -> f64 {
        if self.stations.is_empty() {
            return 0.0;
        }
        let live = self.stations.iter().filter(|s| s.live).count();
        live as f64 / self.stations.len() as f64
    }
}

/// The feed emits coordinates and AQI values as whatever type its backend had
/// on hand. Anything that does not parse cleanly becomes `None`.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}
