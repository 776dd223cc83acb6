use crate::history::error::HistoryError;
use crate::live::error::LiveError;
use crate::pm25::error::Pm25Error;
use crate::stations::error::{LocateError, StationFeedError};
use crate::transport::TransportError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VayuayanError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    StationFeed(#[from] StationFeedError),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Live(#[from] LiveError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Pm25(#[from] Pm25Error),

    #[error(transparent)]
    Frame(#[from] PolarsError),

    #[error("failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
