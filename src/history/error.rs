use crate::transport::TransportError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("repository response reported status '{0}'")]
    RepositoryStatus(String),

    #[error("failed to deserialize repository response")]
    Deserialize(#[from] serde_json::Error),

    #[error("station ID '{0}' not found in the repository directory")]
    UnknownStation(String),

    #[error("no archive found for {subject} in year {year}")]
    ArchiveNotFound { subject: String, year: String },

    #[error("I/O error writing '{0}'")]
    FileIo(PathBuf, #[source] std::io::Error),

    #[error("failed to parse CSV data for station '{station}'")]
    CsvParse {
        station: String,
        #[source]
        source: PolarsError,
    },

    #[error("I/O error processing CSV data for station '{station}'")]
    CsvIo {
        station: String,
        #[source]
        source: std::io::Error,
    },

    #[error("background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
