//! Fetching the all-India station feed from the live dashboard.

use crate::stations::error::StationFeedError;
use crate::transport::{Transport, BASE_URL};
use crate::types::station::City;
use log::info;
use serde_json::json;
use std::sync::Arc;

const ALL_STATIONS_URL_PATH: &str = "/aqi_dashboard/aqi_station_all_india";

/// Client for the station-list endpoint. The feed is fetched fresh on every
/// call; station metadata is never persisted.
pub struct StationFeed {
    transport: Arc<Transport>,
}

impl StationFeed {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Fetches every monitoring station in the country, grouped by city.
    /// Cities are ordered by live-station share (then name), stations within
    /// a city live-first (then name).
    pub async fn all_india(&self) -> Result<Vec<City>, StationFeedError> {
        let url = format!("{BASE_URL}{ALL_STATIONS_URL_PATH}");
        let response = self.transport.post_envelope(&url, &json!({})).await?;

        let stations = response
            .get("stations")
            .cloned()
            .ok_or(StationFeedError::MissingStations)?;
        let mut cities: Vec<City> = serde_json::from_value(stations)?;
        info!(
            "station feed: {} cities, {} stations",
            cities.len(),
            cities.iter().map(|c| c.stations.len()).sum::<usize>()
        );

        sort_city_feed(&mut cities);
        Ok(cities)
    }
}

/// Orders the feed for presentation: cities with the highest share of live
/// stations first (name as tiebreak), and within each city live stations
/// before offline ones, alphabetical within each group.
pub fn sort_city_feed(cities: &mut [City]) {
    cities.sort_by(|a, b| {
        b.live_fraction()
            .partial_cmp(&a.live_fraction())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    for city in cities.iter_mut() {
        city.stations
            .sort_by(|a, b| b.live.cmp(&a.live).then_with(|| a.name.cmp(&b.name)));
    }
}
