//! Errors for the vehicle tracker
use thiserror::Error;

/// Process-level failures: startup, configuration and serving.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("Geocoder client error")]
    GeocoderClientError(#[from] reqwest::Error),

    #[error("Database connection error: {0}")]
    DatabaseConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Failures of the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("Malformed document in {collection}: {message}")]
    MalformedDocument {
        collection: &'static str,
        message: String,
    },
}

/// Failures surfaced by the tracking service to its callers.
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Invalid position format. Expected [lat, lon].")]
    InvalidPosition,

    #[error("Invalid position report: {0}")]
    InvalidReport(String),

    #[error("No positions found for this vehicle")]
    NotFound,

    #[error("Store error")]
    Store(#[from] StoreError),
}

/// Reasons a reverse geocoding lookup produced no address.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("geocoder responded with status {0}")]
    Status(u16),

    #[error("geocoder transport failure: {0}")]
    Transport(String),

    #[error("geocoder timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("geocoder returned an undecodable body: {0}")]
    Decode(String),
}
