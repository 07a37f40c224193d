//! Reqwest-backed Nominatim reverse geocoding adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{AddressCandidate, ReverseGeocoder};
use crate::{
    config::GeocoderConfig,
    errors::{GeocodeError, TrackerError},
    models::Coordinates,
};

/// Reverse geocoding client for a Nominatim `/reverse` compatible endpoint
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ReverseResponseDto {
    #[serde(default)]
    address: Option<AddressDto>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AddressDto {
    suburb: Option<String>,
    village: Option<String>,
    town: Option<String>,
    city: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

impl From<ReverseResponseDto> for AddressCandidate {
    fn from(dto: ReverseResponseDto) -> Self {
        let address = dto.address.unwrap_or_default();
        AddressCandidate {
            suburb: address.suburb,
            village: address.village,
            town: address.town,
            city: address.city,
            county: address.county,
            state: address.state,
            display_name: dto.display_name,
        }
    }
}

impl NominatimClient {
    /// Build a client whose requests never outlive `timeout`
    pub fn new(endpoint: Url, user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_config(config: &GeocoderConfig) -> Result<Self, TrackerError> {
        let endpoint =
            Url::parse(&config.endpoint).map_err(|e| TrackerError::ConfigurationError {
                message: format!("Invalid geocoder endpoint {}: {}", config.endpoint, e),
            })?;
        let timeout = config.submit_timeout.max(config.backfill_timeout);
        Ok(Self::new(endpoint, &config.user_agent, timeout)?)
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, coordinates: Coordinates) -> Result<AddressCandidate, GeocodeError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", coordinates.latitude.to_string()),
                ("lon", coordinates.longitude.to_string()),
                ("accept-language", "en".to_string()),
            ])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        parse_reverse(&body)
    }
}

impl NominatimClient {
    fn map_transport_error(&self, error: reqwest::Error) -> GeocodeError {
        if error.is_timeout() {
            GeocodeError::Timeout(self.timeout)
        } else {
            GeocodeError::Transport(error.to_string())
        }
    }
}

fn parse_reverse(body: &[u8]) -> Result<AddressCandidate, GeocodeError> {
    let decoded: ReverseResponseDto = serde_json::from_slice(body)
        .map_err(|e| GeocodeError::Decode(format!("invalid reverse geocoding payload: {e}")))?;
    Ok(decoded.into())
}
