//! This module provides the main entry point for the CPCB air quality client.
//! It exposes station discovery (nearest / within radius / k-nearest), live
//! AQI readings, and access to the historical repository and satellite PM2.5
//! clients.

use crate::error::VayuayanError;
use crate::frames;
use crate::history::client::HistoryClient;
use crate::live::client::{current_hour_stamp, hour_stamp, LiveClient, LiveSnapshot};
use crate::pm25::client::Pm25Client;
use crate::stations::fetch::StationFeed;
use crate::stations::locate::StationLocator;
use crate::transport::Transport;
use crate::types::station::{City, Station};
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::{NaiveDate, Timelike, Utc};
use polars::prelude::DataFrame;
use std::path::PathBuf;
use std::sync::Arc;

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second
/// (index 1). Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use vayuayan::LatLon;
///
/// let mumbai = LatLon(19.0760, 72.8777);
/// assert_eq!(mumbai.0, 19.0760); // Latitude
/// assert_eq!(mumbai.1, 72.8777); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon(pub f64, pub f64);

/// The main client for CPCB air quality data.
///
/// Station searches re-fetch the live feed on every call, so results always
/// reflect the current network; nothing about stations is cached. Only the
/// satellite PM2.5 rasters are cached on disk, under the directory passed to
/// [`Vayuayan::with_cache_folder`] (or the platform cache dir for
/// [`Vayuayan::new`]).
///
/// # Examples
///
/// ```no_run
/// # use vayuayan::{Vayuayan, VayuayanError};
/// # async fn run() -> Result<(), VayuayanError> {
/// let client = Vayuayan::new().await?;
/// let cities = client.stations().await?;
/// println!("{} cities report stations", cities.len());
/// # Ok(())
/// # }
/// ```
pub struct Vayuayan {
    feed: StationFeed,
    live: LiveClient,
    history: HistoryClient,
    pm25: Pm25Client,
}

#[bon]
impl Vayuayan {
    /// Creates a client with a specific cache directory (used only for PM2.5
    /// rasters). The directory is created if it does not exist.
    pub async fn with_cache_folder(cache_folder: PathBuf) -> Result<Self, VayuayanError> {
        ensure_cache_dir_exists(&cache_folder)
            .await
            .map_err(|e| VayuayanError::CacheDirCreation(cache_folder.clone(), e))?;
        let transport = Arc::new(Transport::new()?);
        Ok(Self {
            feed: StationFeed::new(transport.clone()),
            live: LiveClient::new(transport.clone()),
            history: HistoryClient::new(transport.clone()),
            pm25: Pm25Client::new(transport, cache_folder),
        })
    }

    /// Creates a client using the platform cache directory (e.g.
    /// `~/.cache/vayuayan` on Linux).
    pub async fn new() -> Result<Self, VayuayanError> {
        let cache_folder = get_cache_dir().map_err(VayuayanError::CacheDirResolution)?;
        Self::with_cache_folder(cache_folder).await
    }

    /// Fetches every monitoring station in the country, grouped by city and
    /// ordered live-first.
    pub async fn stations(&self) -> Result<Vec<City>, VayuayanError> {
        Ok(self.feed.all_india().await?)
    }

    /// The station feed flattened to one `DataFrame` row per station.
    pub async fn stations_frame(&self) -> Result<DataFrame, VayuayanError> {
        let cities = self.feed.all_india().await?;
        Ok(frames::stations_frame(&cities)?)
    }

    /// Per-city aggregates of the station feed.
    pub async fn city_summary_frame(&self) -> Result<DataFrame, VayuayanError> {
        let cities = self.feed.all_india().await?;
        Ok(frames::city_summary_frame(&cities)?)
    }

    /// A mapping-oriented `DataFrame` of stations with usable coordinates.
    pub async fn coordinates_frame(&self) -> Result<DataFrame, VayuayanError> {
        let cities = self.feed.all_india().await?;
        Ok(frames::coordinates_frame(&cities)?)
    }

    /// Approximate coordinates of this machine, from IP geolocation.
    pub async fn locate_me(&self) -> Result<LatLon, VayuayanError> {
        let (lat, lon) = self.live.system_location().await?;
        Ok(LatLon(lat, lon))
    }

    /// Finds the monitoring station closest to a location.
    ///
    /// This method uses a builder pattern.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: Optional. Where to search from. Defaults to
    ///   IP geolocation of this machine.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vayuayan::{Vayuayan, VayuayanError, LatLon};
    /// # async fn run() -> Result<(), VayuayanError> {
    /// let client = Vayuayan::new().await?;
    /// let (station, distance_km) = client
    ///     .nearest_station()
    ///     .location(LatLon(19.0760, 72.8777))
    ///     .call()
    ///     .await?;
    /// println!("{} is {:.1} km away", station.name, distance_km);
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn nearest_station(
        &self,
        location: Option<LatLon>,
    ) -> Result<(Station, f64), VayuayanError> {
        let location = match location {
            Some(location) => location,
            None => self.locate_me().await?,
        };
        let cities = self.feed.all_india().await?;
        let locator = StationLocator::from_cities(&cities);
        let (station, distance) = locator.find_nearest(location.0, location.1)?;
        Ok((station.clone(), distance))
    }

    /// Finds the closest station within a search radius.
    ///
    /// Returns `Ok(None)` when no station lies within the radius; that is a
    /// normal outcome, not an error.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** The search center.
    /// * `.max_distance_km(f64)`: Optional. Search radius. Defaults to `100.0`.
    #[builder]
    pub async fn nearest_station_within(
        &self,
        location: LatLon,
        max_distance_km: Option<f64>,
    ) -> Result<Option<(Station, f64)>, VayuayanError> {
        let max_distance_km = max_distance_km.unwrap_or(100.0);
        let cities = self.feed.all_india().await?;
        let locator = StationLocator::from_cities(&cities);
        let found = locator.find_nearest_within_radius(location.0, location.1, max_distance_km)?;
        Ok(found.map(|(station, distance)| (station.clone(), distance)))
    }

    /// Finds the `count` stations closest to a location, ascending by
    /// distance.
    ///
    /// # Arguments
    ///
    /// * `.location(LatLon)`: **Required.** The search center.
    /// * `.count(usize)`: Optional. How many stations to return. Defaults to `5`.
    #[builder]
    pub async fn k_nearest_stations(
        &self,
        location: LatLon,
        count: Option<usize>,
    ) -> Result<Vec<(Station, f64)>, VayuayanError> {
        let count = count.unwrap_or(5);
        let cities = self.feed.all_india().await?;
        let locator = StationLocator::from_cities(&cities);
        let found = locator.find_k_nearest(location.0, location.1, count)?;
        Ok(found
            .into_iter()
            .map(|(station, distance)| (station.clone(), distance))
            .collect())
    }

    /// Fetches a live AQI reading.
    ///
    /// The station is resolved in order of preference: an explicit
    /// `.station(..)`, the station nearest to `.location(..)`, or the station
    /// nearest to this machine's IP geolocation. The timestamp defaults to
    /// the most recent whole hour (UTC).
    ///
    /// # Arguments
    ///
    /// * `.station(String)`: Optional. A station ID such as `"site_5964"`.
    /// * `.location(LatLon)`: Optional. Used when no station ID is given.
    /// * `.date(NaiveDate)`: Optional. Reading date; defaults to today.
    /// * `.hour(u32)`: Optional. Reading hour (0-23); defaults to the current hour.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vayuayan::{Vayuayan, VayuayanError};
    /// # async fn run() -> Result<(), VayuayanError> {
    /// let client = Vayuayan::new().await?;
    /// let snapshot = client
    ///     .live_aqi()
    ///     .station("site_5964".to_string())
    ///     .call()
    ///     .await?;
    /// for metric in &snapshot.metrics {
    ///     println!("{}: {:?}", metric.name, metric.avg);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub async fn live_aqi(
        &self,
        station: Option<String>,
        location: Option<LatLon>,
        date: Option<NaiveDate>,
        hour: Option<u32>,
    ) -> Result<LiveSnapshot, VayuayanError> {
        let station_id = match station {
            Some(id) => id,
            None => {
                let location = match location {
                    Some(location) => location,
                    None => self.locate_me().await?,
                };
                let cities = self.feed.all_india().await?;
                let locator = StationLocator::from_cities(&cities);
                let (station, _) = locator.find_nearest(location.0, location.1)?;
                station.id.clone()
            }
        };

        let timestamp = match (date, hour) {
            (None, None) => current_hour_stamp(),
            (date, hour) => {
                let now = Utc::now();
                let date = date.unwrap_or_else(|| now.date_naive());
                let hour = hour.unwrap_or_else(|| now.hour());
                hour_stamp(date, hour)?
            }
        };

        Ok(self.live.snapshot(&station_id, &timestamp).await?)
    }

    /// The historical data-repository client.
    pub fn history(&self) -> &HistoryClient {
        &self.history
    }

    /// The satellite PM2.5 raster client.
    pub fn pm25(&self) -> &Pm25Client {
        &self.pm25
    }

    /// The live dashboard client.
    pub fn live(&self) -> &LiveClient {
        &self.live
    }
}
