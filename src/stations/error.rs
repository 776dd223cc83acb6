use crate::transport::TransportError;
use thiserror::Error;

/// Failure modes of the in-memory station search.
///
/// A radius search that simply finds nothing in range is not an error; it
/// reports `Ok(None)`. This enum only covers the case where there was nothing
/// to search in the first place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("station feed is empty or contains no station with usable coordinates")]
    NoValidStations,
}

/// Errors fetching or decoding the all-India station feed.
#[derive(Debug, Error)]
pub enum StationFeedError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("station feed response has no 'stations' key")]
    MissingStations,

    #[error("failed to deserialize station feed")]
    Deserialize(#[from] serde_json::Error),
}
