// HTTP request handlers
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    error::{ApiError, JsonBody},
    AppState,
};
use crate::models::{
    Confirmation, LoginInfo, PositionReport, RouteInfo, StatusInfo, StoredLogin, StoredPosition,
    VehicleInfo,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
}

/// Liveness check
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Vehicle Tracking API is running." }))
}

pub async fn submit_position(
    State(state): State<AppState>,
    JsonBody(report): JsonBody<PositionReport>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.submit(report).await?))
}

pub async fn update_position(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.update(&vehicle_id, &payload).await?))
}

pub async fn list_positions(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<StoredPosition>> {
    Ok(Json(state.tracking.list(&vehicle_id, params.limit).await?))
}

pub async fn latest_position(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
) -> ApiResult<StoredPosition> {
    Ok(Json(state.tracking.latest(&vehicle_id).await?))
}

pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    JsonBody(info): JsonBody<VehicleInfo>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.upsert_vehicle(&vehicle_id, info).await?))
}

pub async fn update_route(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    JsonBody(info): JsonBody<RouteInfo>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.upsert_route(&vehicle_id, info).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    JsonBody(info): JsonBody<StatusInfo>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.upsert_status(&vehicle_id, info).await?))
}

pub async fn save_login(
    State(state): State<AppState>,
    JsonBody(info): JsonBody<LoginInfo>,
) -> ApiResult<Confirmation> {
    Ok(Json(state.tracking.record_login(info).await?))
}

pub async fn list_logins(State(state): State<AppState>) -> ApiResult<Vec<StoredLogin>> {
    Ok(Json(state.tracking.list_logins().await?))
}
