//! Client for India's Central Pollution Control Board (CPCB) air quality
//! services: live and historical station-level AQI data, nearest-station
//! search, and satellite-derived PM2.5 raster statistics.

mod envelope;
mod error;
mod frames;
mod history;
mod live;
mod pm25;
mod stations;
mod transport;
mod types;
mod utils;
mod vayuayan;

pub use error::VayuayanError;
pub use vayuayan::*;

pub use frames::{city_summary_frame, coordinates_frame, stations_frame};

pub use types::aqi::AqiCategory;
pub use types::archive::{ArchiveFrequency, ArchiveScope};
pub use types::station::{City, Station};

pub use stations::error::{LocateError, StationFeedError};
pub use stations::fetch::{sort_city_feed, StationFeed};
pub use stations::locate::{euclidean_deg, haversine_km, StationLocator, EARTH_RADIUS_KM};

pub use live::client::{LiveClient, LiveSnapshot, PollutantMetric, PollutantSeries, SeriesPoint};
pub use live::error::LiveError;

pub use history::client::{
    clean_station_name, ArchiveFile, ArchiveQuery, DirectoryEntry, HistoryClient, RawDataRequest,
    StationDirectory,
};
pub use history::error::HistoryError;

pub use pm25::client::{netcdf_filename, netcdf_url, Pm25Client};
pub use pm25::clip::Pm25Stats;
pub use pm25::error::Pm25Error;

pub use envelope::EnvelopeError;
pub use transport::{Transport, TransportError};
