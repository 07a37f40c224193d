//! HTTP server setup and routing

mod error;
mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::CorsConfig, errors::TrackerError, tracking::TrackingService};

pub use error::{ApiError, JsonBody};

#[derive(Clone)]
pub struct AppState {
    pub tracking: Arc<TrackingService>,
}

/// Create the application router with all routes and middleware
pub fn create_app(tracking: Arc<TrackingService>, cors: &CorsConfig) -> Router {
    let state = AppState { tracking };

    Router::new()
        .route("/", get(handlers::root))
        .route("/positions", post(handlers::submit_position))
        .route("/positions/", post(handlers::submit_position))
        .route(
            "/positions/update/:vehicle_id",
            post(handlers::update_position),
        )
        .route(
            "/positions/latest/:vehicle_id",
            get(handlers::latest_position),
        )
        .route("/positions/:vehicle_id", get(handlers::list_positions))
        .route("/vehicles/update/:vehicle_id", post(handlers::update_vehicle))
        .route("/routes/update/:vehicle_id", post(handlers::update_route))
        .route("/status/update/:vehicle_id", post(handlers::update_status))
        .route("/login", post(handlers::save_login))
        .route("/logins", get(handlers::list_logins))
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS layer; a `*` entry allows any origin
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Serve `app` on `addr` until `shutdown` resolves
pub async fn run_server<F>(app: Router, addr: SocketAddr, shutdown: F) -> Result<(), TrackerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
