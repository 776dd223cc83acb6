use crate::transport::TransportError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Pm25Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error on cached file '{0}'")]
    CacheIo(PathBuf, #[source] std::io::Error),

    #[error("failed to read GeoJSON file '{0}'")]
    GeoJsonRead(PathBuf, #[source] std::io::Error),

    #[error("failed to parse GeoJSON")]
    GeoJson(#[from] geojson::Error),

    #[error("GeoJSON contains no usable geometry")]
    NoPolygons,

    #[error("failed to read NetCDF data")]
    NetCdf(#[from] netcdf::Error),

    #[error("PM2.5 variable not found; available variables: {available}")]
    VariableNotFound { available: String },

    #[error("latitude/longitude coordinates not found in NetCDF file")]
    CoordinatesNotFound,

    #[error("expected a 2-dimensional PM2.5 grid, found {0} dimensions")]
    UnsupportedShape(usize),

    #[error("no valid PM2.5 cells within the polygon boundary")]
    NoCellsInPolygon,

    #[error("property '{0}' missing from one or more GeoJSON features")]
    MissingProperty(String),

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("failed to build statistics frame")]
    Frame(#[from] PolarsError),
}
