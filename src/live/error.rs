use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("hour {0} is out of range (0-23)")]
    InvalidHour(u32),

    #[error("IP geolocation lookup failed: {0}")]
    Geolocation(String),

    #[error("failed to deserialize live AQI response")]
    Deserialize(#[from] serde_json::Error),
}
