//! Reverse geocoding enrichment.
//!
//! A [`ReverseGeocoder`] fetches address data for a coordinate pair and may
//! fail in any number of ways. The [`Resolver`] bounds every lookup with a
//! timeout and folds the outcome into an [`Enrichment`], which always yields
//! a usable label: the place name when one is found, otherwise the numeric
//! `"<lat>, <lon>"` fallback.

mod nominatim;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{errors::GeocodeError, models::Coordinates};

pub use nominatim::NominatimClient;

/// Address data returned by a reverse geocoding lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressCandidate {
    pub suburb: Option<String>,
    pub village: Option<String>,
    pub town: Option<String>,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub display_name: Option<String>,
}

impl AddressCandidate {
    /// Pick the finest-grained non-blank locality, then the display name
    pub fn label(&self) -> Option<&str> {
        [
            &self.suburb,
            &self.village,
            &self.town,
            &self.city,
            &self.county,
            &self.state,
            &self.display_name,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .find(|value| !value.is_empty())
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> Result<AddressCandidate, GeocodeError>;
}

/// Outcome of enriching a coordinate pair with a place name
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment {
    /// The lookup succeeded. Carries the preferred address field, or the
    /// numeric label when the response had no usable fields.
    Resolved(String),
    /// The lookup failed; only the numeric label is available.
    Failed {
        fallback: String,
        reason: GeocodeError,
    },
}

impl Enrichment {
    pub fn into_label(self) -> String {
        match self {
            Enrichment::Resolved(label) => label,
            Enrichment::Failed { fallback, .. } => fallback,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Enrichment::Resolved(_))
    }
}

/// Best-effort place name lookup
#[derive(Clone)]
pub struct Resolver {
    geocoder: Arc<dyn ReverseGeocoder>,
}

impl Resolver {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self { geocoder }
    }

    /// Look up `coordinates`, giving up after `timeout`
    pub async fn enrich(&self, coordinates: Coordinates, timeout: Duration) -> Enrichment {
        let fallback = coordinates.fallback_label();
        match tokio::time::timeout(timeout, self.geocoder.reverse(coordinates)).await {
            Ok(Ok(candidate)) => {
                Enrichment::Resolved(candidate.label().map(str::to_string).unwrap_or(fallback))
            }
            Ok(Err(reason)) => Enrichment::Failed { fallback, reason },
            Err(_) => Enrichment::Failed {
                fallback,
                reason: GeocodeError::Timeout(timeout),
            },
        }
    }

    /// Label for `coordinates`; never fails
    pub async fn resolve(&self, coordinates: Coordinates, timeout: Duration) -> String {
        let enrichment = self.enrich(coordinates, timeout).await;
        match &enrichment {
            Enrichment::Resolved(label) => {
                debug!("Resolved {:?} to {:?}", coordinates, label);
            }
            Enrichment::Failed { reason, .. } => {
                warn!(
                    "Reverse geocoding failed for ({}, {}): {}",
                    coordinates.latitude, coordinates.longitude, reason
                );
            }
        }
        enrichment.into_label()
    }
}
