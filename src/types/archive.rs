//! Enums describing what the historical data repository can be asked for.

use std::fmt;

/// Aggregation frequency of an archived dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFrequency {
    Hourly,
    Daily,
}

impl ArchiveFrequency {
    /// The token the repository's `file_Path` endpoint expects.
    pub(crate) fn request_token(&self) -> &'static str {
        match self {
            ArchiveFrequency::Hourly => "hourly",
            ArchiveFrequency::Daily => "daily",
        }
    }
}

impl fmt::Display for ArchiveFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_token())
    }
}

/// Whether an archive aggregates a whole city or a single station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveScope {
    CityLevel,
    StationLevel,
}

impl ArchiveScope {
    pub(crate) fn request_token(&self) -> &'static str {
        match self {
            ArchiveScope::CityLevel => "cityLevel",
            ArchiveScope::StationLevel => "stationLevel",
        }
    }
}

impl fmt::Display for ArchiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.request_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tokens_match_portal_spelling() {
        assert_eq!(ArchiveFrequency::Hourly.to_string(), "hourly");
        assert_eq!(ArchiveFrequency::Daily.to_string(), "daily");
        assert_eq!(ArchiveScope::CityLevel.to_string(), "cityLevel");
        assert_eq!(ArchiveScope::StationLevel.to_string(), "stationLevel");
    }
}
