//! Application configuration

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::TrackerError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub geocoder: GeocoderConfig,
    pub positions: PositionsConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which document store implementation backs the service
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    /// Connection string, supplied through the environment only
    #[serde(default)]
    pub url: String,
    pub max_connections: u32,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct GeocoderConfig {
    /// Reverse geocoding endpoint (Nominatim `/reverse` compatible)
    pub endpoint: String,
    pub user_agent: String,
    /// Bound on the lookup made while ingesting a position
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub submit_timeout: Duration,
    /// Bound on the lookup made when backfilling a legacy latest position
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub backfill_timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionsConfig {
    pub default_limit: i64,
    /// Keep timestamps supplied by clients instead of stamping server time
    pub trust_client_timestamps: bool,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            trust_client_timestamps: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("database.backend", "postgres")?
            .set_default("database.max_connections", 5)?
            .set_default(
                "geocoder.endpoint",
                "https://nominatim.openstreetmap.org/reverse",
            )?
            .set_default("geocoder.user_agent", "vehicle-tracker/0.1")?
            .set_default("geocoder.submit_timeout", 10)?
            .set_default("geocoder.backfill_timeout", 5)?
            .set_default("positions.default_limit", 100)?
            .set_default("positions.trust_client_timestamps", true)?
            .set_default("cors.allowed_origins", vec!["*"])?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("TRACKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.server.validate()?;
        self.database.validate()?;
        self.geocoder.validate()?;
        if self.positions.default_limit < 0 {
            return Err(TrackerError::ConfigurationError {
                message: "Default position limit cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, TrackerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| TrackerError::ConfigurationError {
                message: format!("Invalid server address: {}", e),
            })
    }

    fn validate(&self) -> Result<(), TrackerError> {
        self.socket_addr().map(|_| ())
    }
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), TrackerError> {
        if self.backend == StoreBackend::Postgres && self.url.trim().is_empty() {
            return Err(TrackerError::ConfigurationError {
                message: "Database url cannot be empty".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(TrackerError::ConfigurationError {
                message: "Max connections must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl GeocoderConfig {
    fn validate(&self) -> Result<(), TrackerError> {
        if self.endpoint.trim().is_empty() {
            return Err(TrackerError::ConfigurationError {
                message: "Geocoder endpoint cannot be empty".to_string(),
            });
        }
        if self.submit_timeout.is_zero() || self.backfill_timeout.is_zero() {
            return Err(TrackerError::ConfigurationError {
                message: "Geocoder timeouts must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
