// src/server/error.rs
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use crate::errors::TrackingError;

/// Error response of the HTTP layer, rendered as `{"detail": message}`
#[derive(Debug)]
pub enum ApiError {
    Tracking(TrackingError),
    /// Request body that could not be read as the expected JSON
    Body(JsonRejection),
}

impl From<TrackingError> for ApiError {
    fn from(error: TrackingError) -> Self {
        Self::Tracking(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Tracking(TrackingError::InvalidPosition | TrackingError::InvalidReport(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Tracking(TrackingError::NotFound) => StatusCode::NOT_FOUND,
            Self::Tracking(TrackingError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Body(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            Self::Tracking(TrackingError::Store(e)) => {
                error!("Store failure: {} ({:?})", e, e);
                "Internal server error".to_string()
            }
            Self::Tracking(other) => other.to_string(),
            Self::Body(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                rejection.body_text()
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// JSON body extractor whose rejections render as [`ApiError`]
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
