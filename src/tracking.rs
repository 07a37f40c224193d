//! Position ingestion and vehicle metadata service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    config::{GeocoderConfig, PositionsConfig},
    database::{
        from_document, to_document, Collection, DocumentStore, Filter, FindOptions, Sort,
    },
    errors::TrackingError,
    geocoding::Resolver,
    models::{
        Confirmation, Coordinates, LoginInfo, PositionRecord, PositionReport, RouteInfo,
        StatusInfo, StoredLogin, StoredPosition, VehicleInfo,
    },
};

const POSITION_SAVED: Confirmation = Confirmation::new("Position saved successfully");
const POSITION_UPDATED: Confirmation = Confirmation::new("Position updated");
const VEHICLE_UPDATED: Confirmation = Confirmation::new("Vehicle info updated");
const ROUTE_UPDATED: Confirmation = Confirmation::new("Route info updated");
const STATUS_UPDATED: Confirmation = Confirmation::new("Status info updated");
const LOGIN_SAVED: Confirmation = Confirmation::new("Login info saved");

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Geocoding bound while ingesting a position
    pub submit_timeout: Duration,
    /// Geocoding bound while backfilling a latest position
    pub backfill_timeout: Duration,
    pub default_limit: i64,
    pub trust_client_timestamps: bool,
}

impl TrackingSettings {
    pub fn from_config(geocoder: &GeocoderConfig, positions: &PositionsConfig) -> Self {
        Self {
            submit_timeout: geocoder.submit_timeout,
            backfill_timeout: geocoder.backfill_timeout,
            default_limit: positions.default_limit,
            trust_client_timestamps: positions.trust_client_timestamps,
        }
    }
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            submit_timeout: Duration::from_secs(10),
            backfill_timeout: Duration::from_secs(5),
            default_limit: 100,
            trust_client_timestamps: true,
        }
    }
}

pub struct TrackingService {
    store: Arc<dyn DocumentStore>,
    resolver: Resolver,
    settings: TrackingSettings,
}

impl TrackingService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        resolver: Resolver,
        settings: TrackingSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            settings,
        }
    }

    /// Persist a position report enriched with its place name.
    ///
    /// Geocoding failures degrade to the numeric label and never prevent the
    /// write; store failures propagate.
    pub async fn submit(&self, report: PositionReport) -> Result<Confirmation, TrackingError> {
        let vehicle_id = normalize_vehicle_id(&report.vehicle_id)?;
        let coordinates = report.coordinates();
        coordinates.validate()?;

        let timestamp = match report.timestamp {
            Some(timestamp) if self.settings.trust_client_timestamps => timestamp,
            _ => Utc::now(),
        };
        let live_location = self
            .resolver
            .resolve(coordinates, self.settings.submit_timeout)
            .await;

        let record = PositionRecord {
            vehicle_id,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            timestamp,
            live_location: Some(live_location),
        };
        let id = self
            .store
            .insert_one(
                Collection::Positions,
                to_document(Collection::Positions, &record)?,
            )
            .await?;

        info!(
            "Saved position {} for vehicle {} at {:?}",
            id, record.vehicle_id, record.live_location
        );
        Ok(POSITION_SAVED)
    }

    /// Persist a `{"position": [lat, lon]}` push without geocoding
    pub async fn update(
        &self,
        vehicle_id: &str,
        payload: &Value,
    ) -> Result<Confirmation, TrackingError> {
        let vehicle_id = normalize_vehicle_id(vehicle_id)?;
        let coordinates = parse_position_pair(payload)?;
        coordinates.validate()?;

        let record = PositionRecord {
            vehicle_id,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            timestamp: Utc::now(),
            live_location: None,
        };
        let id = self
            .store
            .insert_one(
                Collection::Positions,
                to_document(Collection::Positions, &record)?,
            )
            .await?;

        debug!("Updated position {} for vehicle {}", id, record.vehicle_id);
        Ok(POSITION_UPDATED)
    }

    /// Most recent positions of a vehicle, newest first
    pub async fn list(
        &self,
        vehicle_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<StoredPosition>, TrackingError> {
        let limit = limit.unwrap_or(self.settings.default_limit).max(0);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let documents = self
            .store
            .find(
                Collection::Positions,
                Filter::by("vehicle_id", vehicle_id),
                FindOptions::sorted(Sort::descending("timestamp")).limit(limit),
            )
            .await?;

        documents
            .into_iter()
            .map(|doc| from_document(Collection::Positions, doc).map_err(TrackingError::from))
            .collect()
    }

    /// Newest position of a vehicle.
    ///
    /// Records stored without a place name get one resolved on every read;
    /// the value is not written back.
    pub async fn latest(&self, vehicle_id: &str) -> Result<StoredPosition, TrackingError> {
        let document = self
            .store
            .find_one(
                Collection::Positions,
                Filter::by("vehicle_id", vehicle_id),
                Some(Sort::descending("timestamp")),
            )
            .await?
            .ok_or(TrackingError::NotFound)?;

        let mut position: StoredPosition = from_document(Collection::Positions, document)?;
        let missing = position
            .record
            .live_location
            .as_deref()
            .map_or(true, |label| label.trim().is_empty());
        if missing {
            let label = self
                .resolver
                .resolve(
                    position.record.coordinates(),
                    self.settings.backfill_timeout,
                )
                .await;
            position.record.live_location = Some(label);
        }
        Ok(position)
    }

    pub async fn upsert_vehicle(
        &self,
        vehicle_id: &str,
        info: VehicleInfo,
    ) -> Result<Confirmation, TrackingError> {
        let fields = to_document(Collection::Vehicles, &info)?;
        self.store
            .update_one(Collection::Vehicles, Filter::by("id", vehicle_id), fields, true)
            .await?;
        Ok(VEHICLE_UPDATED)
    }

    pub async fn upsert_route(
        &self,
        vehicle_id: &str,
        info: RouteInfo,
    ) -> Result<Confirmation, TrackingError> {
        let fields = to_document(Collection::Routes, &info)?;
        self.store
            .update_one(
                Collection::Routes,
                Filter::by("vehicle_id", vehicle_id),
                fields,
                true,
            )
            .await?;
        Ok(ROUTE_UPDATED)
    }

    pub async fn upsert_status(
        &self,
        vehicle_id: &str,
        info: StatusInfo,
    ) -> Result<Confirmation, TrackingError> {
        let fields = to_document(Collection::Status, &info)?;
        self.store
            .update_one(
                Collection::Status,
                Filter::by("vehicle_id", vehicle_id),
                fields,
                true,
            )
            .await?;
        Ok(STATUS_UPDATED)
    }

    pub async fn record_login(&self, info: LoginInfo) -> Result<Confirmation, TrackingError> {
        let id = self
            .store
            .insert_one(Collection::Logins, to_document(Collection::Logins, &info)?)
            .await?;
        info!("Recorded login {} for {}", id, info.username);
        Ok(LOGIN_SAVED)
    }

    /// All login events, newest first
    pub async fn list_logins(&self) -> Result<Vec<StoredLogin>, TrackingError> {
        let documents = self
            .store
            .find(
                Collection::Logins,
                Filter::all(),
                FindOptions::sorted(Sort::descending("login_time")),
            )
            .await?;

        documents
            .into_iter()
            .map(|doc| from_document(Collection::Logins, doc).map_err(TrackingError::from))
            .collect()
    }
}

fn normalize_vehicle_id(vehicle_id: &str) -> Result<String, TrackingError> {
    let trimmed = vehicle_id.trim();
    if trimmed.is_empty() {
        return Err(TrackingError::InvalidReport(
            "vehicle_id cannot be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Accept exactly two numbers under `position`
fn parse_position_pair(payload: &Value) -> Result<Coordinates, TrackingError> {
    match payload.get("position").and_then(Value::as_array).map(Vec::as_slice) {
        Some([latitude, longitude]) => match (latitude.as_f64(), longitude.as_f64()) {
            (Some(latitude), Some(longitude)) => Ok(Coordinates::new(latitude, longitude)),
            _ => Err(TrackingError::InvalidPosition),
        },
        _ => Err(TrackingError::InvalidPosition),
    }
}
