//! Data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrackingError;
use serde_helpers::*;

/// A WGS84 coordinate pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that both values are finite and within WGS84 ranges
    pub fn validate(&self) -> Result<(), TrackingError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(TrackingError::InvalidReport(
                "coordinates must be finite numbers".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(TrackingError::InvalidReport(
                "latitude must be within [-90, 90]".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(TrackingError::InvalidReport(
                "longitude must be within [-180, 180]".to_string(),
            ));
        }
        Ok(())
    }

    /// Numeric label used when no place name can be resolved, e.g. `12.34, 56.78`
    pub fn fallback_label(&self) -> String {
        format!(
            "{}, {}",
            format_degrees(self.latitude),
            format_degrees(self.longitude)
        )
    }
}

/// Integral values keep one decimal place so `1` renders as `1.0`.
fn format_degrees(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Position report submitted by a vehicle
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionReport {
    /// Vehicle identifier; numeric identifiers are accepted and kept as text
    #[serde(deserialize_with = "deserialize_vehicle_id")]
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Report time, ingestion time when absent
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PositionReport {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Position as persisted in the `positions` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Resolved place name; absent for lightweight updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_location: Option<String>,
}

impl PositionRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// A record together with the identifier the store assigned to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stored<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

pub type StoredPosition = Stored<PositionRecord>;
pub type StoredLogin = Stored<LoginInfo>;

/// Vehicle metadata, upserted into `vehicles` keyed by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub company: String,
    pub username: String,
}

/// Planned route of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub waypoints: Vec<serde_json::Value>,
    pub path: Vec<serde_json::Value>,
    pub distance: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: String,
    pub live_location: String,
    pub last_updated: String,
}

/// Driver login event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub username: String,
    #[serde(rename = "companyCode")]
    pub company_code: String,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: String,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub login_time: DateTime<Utc>,
}

/// Acknowledgement returned by write endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Confirmation {
    pub status: &'static str,
}

impl Confirmation {
    pub const fn new(status: &'static str) -> Self {
        Self { status }
    }
}

/// Custom (de)serializers
pub(crate) mod serde_helpers {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    /// Fixed-width RFC 3339 timestamps, so lexical order matches time order.
    pub mod timestamp {
        use chrono::{DateTime, SecondsFormat, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn format(value: &DateTime<Utc>) -> String {
            value.to_rfc3339_opts(SecondsFormat::Micros, true)
        }

        pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format(value))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            super::parse_timestamp(&s).map_err(serde::de::Error::custom)
        }
    }

    /// Accept RFC 3339, or a naive ISO 8601 timestamp taken as UTC.
    pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp {:?}: {}", s, e))
    }

    pub fn deserialize_optional_timestamp<'de, D>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse_timestamp(&s).map(Some).map_err(de::Error::custom),
        }
    }

    pub fn deserialize_vehicle_id<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(s) => s.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        };
        if id.is_empty() {
            return Err(de::Error::custom("vehicle_id cannot be empty"));
        }
        Ok(id)
    }
}
