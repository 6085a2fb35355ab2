//! GTFS static data error types.

/// Errors that can occur when loading GTFS static data.
#[derive(Debug, thiserror::Error)]
pub enum GtfsError {
    /// Downloading the feed failed
    #[error("download failed: {0}")]
    Download(String),

    /// The archive could not be opened
    #[error("invalid GTFS archive: {0}")]
    Zip(String),

    /// The server returned an HTML page instead of a zip
    #[error("downloaded file is an HTML page, not a GTFS zip")]
    NotAZip,

    /// A required file is absent from the archive
    #[error("{0} not found in GTFS archive")]
    MissingFile(&'static str),

    /// A CSV file could not be parsed
    #[error("failed to parse {file}: {message}")]
    Csv { file: &'static str, message: String },

    /// `stops.txt` contained no stops
    #[error("GTFS archive contains no stops")]
    NoStops,

    /// Cache operation failed
    #[error("cache error: {message}")]
    Cache { message: String },

    /// No feed URL configured for this provider
    #[error("no GTFS static feed configured for {0}")]
    NotConfigured(String),

    /// The manager has been shut down
    #[error("GTFS manager is shut down")]
    ShutDown,

    /// Background parsing task failed
    #[error("GTFS parse task failed: {0}")]
    Task(String),
}

impl GtfsError {
    pub(crate) fn csv(file: &'static str, err: impl std::fmt::Display) -> Self {
        GtfsError::Csv {
            file,
            message: err.to_string(),
        }
    }

    pub(crate) fn cache(message: impl Into<String>) -> Self {
        GtfsError::Cache {
            message: message.into(),
        }
    }
}
