use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use vehicle_tracker::{
    config::CorsConfig,
    database::{
        Collection, Document, DocumentStore, Filter, FindOptions, MemoryStore, StoredDocument,
        UpdateOutcome,
    },
    errors::{GeocodeError, StoreError},
    geocoding::{AddressCandidate, Resolver, ReverseGeocoder},
    models::Coordinates,
    server::create_app,
    tracking::{TrackingService, TrackingSettings},
};

struct FixedGeocoder {
    outcome: Result<AddressCandidate, GeocodeError>,
    delay: Duration,
}

#[async_trait]
impl ReverseGeocoder for FixedGeocoder {
    async fn reverse(&self, _: Coordinates) -> Result<AddressCandidate, GeocodeError> {
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}

fn springfield() -> FixedGeocoder {
    FixedGeocoder {
        outcome: Ok(AddressCandidate {
            city: Some("Springfield".to_string()),
            state: Some("Illinois".to_string()),
            ..Default::default()
        }),
        delay: Duration::ZERO,
    }
}

struct TestApp {
    base: String,
    store: Arc<MemoryStore>,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Store that fails every operation
struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn insert_one(
        &self,
        collection: Collection,
        _: Document,
    ) -> Result<String, StoreError> {
        Err(unavailable(collection))
    }

    async fn update_one(
        &self,
        collection: Collection,
        _: Filter,
        _: Document,
        _: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        Err(unavailable(collection))
    }

    async fn find(
        &self,
        collection: Collection,
        _: Filter,
        _: FindOptions,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        Err(unavailable(collection))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(unavailable(Collection::Positions))
    }
}

fn unavailable(collection: Collection) -> StoreError {
    StoreError::MalformedDocument {
        collection: collection.name(),
        message: "connection reset".to_string(),
    }
}

async fn serve(
    store: Arc<dyn DocumentStore>,
    geocoder: FixedGeocoder,
    settings: TrackingSettings,
) -> String {
    let tracking = Arc::new(TrackingService::new(
        store,
        Resolver::new(Arc::new(geocoder)),
        settings,
    ));
    let app = create_app(tracking, &CorsConfig::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn spawn_app(geocoder: FixedGeocoder, settings: TrackingSettings) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let base = serve(store.clone(), geocoder, settings).await;

    TestApp {
        base,
        store,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_root_reports_liveness() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Vehicle Tracking API is running.");
}

#[tokio::test]
async fn test_submit_position_persists_enriched_record() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/"))
        .json(&json!({"vehicle_id": 7, "latitude": 39.78, "longitude": -89.65}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "Position saved successfully");
    assert_eq!(app.store.count(Collection::Positions).await, 1);

    let latest: Value = app
        .client
        .get(app.url("/positions/latest/7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["vehicle_id"], "7");
    assert_eq!(latest["live_location"], "Springfield");
    assert!(latest["_id"].is_string());
}

#[tokio::test]
async fn test_submit_position_when_geocoder_times_out() {
    let geocoder = FixedGeocoder {
        delay: Duration::from_secs(30),
        ..springfield()
    };
    let settings = TrackingSettings {
        submit_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let app = spawn_app(geocoder, settings).await;

    let response = app
        .client
        .post(app.url("/positions/"))
        .json(&json!({"vehicle_id": "7", "latitude": 12.34, "longitude": 56.78}))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.count(Collection::Positions).await, 1);

    let latest: Value = app
        .client
        .get(app.url("/positions/latest/7"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["live_location"], "12.34, 56.78");
}

#[tokio::test]
async fn test_submit_position_rejects_invalid_coordinates() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/"))
        .json(&json!({"vehicle_id": "7", "latitude": 95.0, "longitude": 0.0}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.count(Collection::Positions).await, 0);
}

#[tokio::test]
async fn test_update_position_wrong_arity() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/update/bus-1"))
        .json(&json!({"position": [1, 2, 3]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "Invalid position format. Expected [lat, lon]."
    );
    assert_eq!(app.store.count(Collection::Positions).await, 0);
}

#[tokio::test]
async fn test_update_position_malformed_body() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/update/bus-1"))
        .header("content-type", "application/json")
        .body("[1,2")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"]
        .as_str()
        .is_some_and(|detail| detail.contains("parse the request body")));
    assert_eq!(app.store.count(Collection::Positions).await, 0);
}

#[tokio::test]
async fn test_submit_position_without_vehicle_id() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/"))
        .json(&json!({"latitude": 1.0, "longitude": 2.0}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"]
        .as_str()
        .is_some_and(|detail| detail.contains("vehicle_id")));
    assert_eq!(app.store.count(Collection::Positions).await, 0);
}

#[tokio::test]
async fn test_submit_position_store_failure() {
    let base = serve(
        Arc::new(UnavailableStore),
        springfield(),
        TrackingSettings::default(),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/positions/", base))
        .json(&json!({"vehicle_id": "7", "latitude": 1.0, "longitude": 2.0}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"detail": "Internal server error"}));
}

#[tokio::test]
async fn test_update_position_then_latest_backfills() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .post(app.url("/positions/update/bus-1"))
        .json(&json!({"position": [39.78, -89.65]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let latest: Value = app
        .client
        .get(app.url("/positions/latest/bus-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest["live_location"], "Springfield");

    let history: Value = app
        .client
        .get(app.url("/positions/bus-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(history[0].get("live_location").is_none());
}

#[tokio::test]
async fn test_latest_position_not_found() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .get(app.url("/positions/latest/ghost"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "No positions found for this vehicle");
}

#[tokio::test]
async fn test_list_positions_limit_newest_first() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;
    for hour in [11, 13, 10, 14, 12] {
        let response = app
            .client
            .post(app.url("/positions/"))
            .json(&json!({
                "vehicle_id": "7",
                "latitude": 1.0,
                "longitude": 2.0,
                "timestamp": format!("2024-05-01T{hour}:00:00Z"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let listed: Vec<Value> = app
        .client
        .get(app.url("/positions/7?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["timestamp"], "2024-05-01T14:00:00.000000Z");
    assert_eq!(listed[1]["timestamp"], "2024-05-01T13:00:00.000000Z");
}

#[tokio::test]
async fn test_metadata_upserts() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;
    let vehicle = json!({
        "id": "7",
        "name": "Bus 7",
        "type": "bus",
        "company": "ACME",
        "username": "driver"
    });

    for _ in 0..2 {
        let response = app
            .client
            .post(app.url("/vehicles/update/7"))
            .json(&vehicle)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "Vehicle info updated");
    }
    assert_eq!(app.store.count(Collection::Vehicles).await, 1);

    let response = app
        .client
        .post(app.url("/routes/update/7"))
        .json(&json!({
            "waypoints": [[1.0, 2.0]],
            "path": [[1.0, 2.0], [1.5, 2.5]],
            "distance": 12.5,
            "duration": 900.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.count(Collection::Routes).await, 1);

    let response = app
        .client
        .post(app.url("/status/update/7"))
        .json(&json!({
            "status": "moving",
            "live_location": "Springfield",
            "last_updated": "2024-05-01T10:00:00"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.count(Collection::Status).await, 1);
}

#[tokio::test]
async fn test_logins_newest_first() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;
    for (user, time) in [("early", "2024-05-01T08:00:00"), ("late", "2024-05-01T18:00:00")] {
        let response = app
            .client
            .post(app.url("/login"))
            .json(&json!({
                "username": user,
                "companyCode": "ACME",
                "vehicleId": "7",
                "login_time": time
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app
        .client
        .post(app.url("/login"))
        .json(&json!({"username": "now", "companyCode": "ACME", "vehicleId": "7"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logins: Vec<Value> = app
        .client
        .get(app.url("/logins"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let users: Vec<_> = logins.iter().map(|l| l["username"].clone()).collect();
    assert_eq!(users, vec![json!("now"), json!("late"), json!("early")]);
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let app = spawn_app(springfield(), TrackingSettings::default()).await;

    let response = app
        .client
        .get(app.url("/"))
        .header("Origin", "http://dashboard.test")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
