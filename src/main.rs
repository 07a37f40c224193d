//! Vehicle tracker service

use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};

use vehicle_tracker::{
    config::{AppConfig, StoreBackend},
    database::{DocumentStore, MemoryStore, PgDocumentStore},
    errors::TrackerError,
    geocoding::{NominatimClient, Resolver},
    server::{create_app, run_server},
    tracking::{TrackingService, TrackingSettings},
};

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let store: Arc<dyn DocumentStore> = match config.database.backend {
        StoreBackend::Postgres => Arc::new(
            PgDocumentStore::from_url(&config.database.url, config.database.max_connections)
                .await?,
        ),
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    match store.ping().await {
        Ok(()) => info!("Document store connection successful"),
        Err(e) => warn!("Document store ping failed: {}", e),
    }

    let geocoder = NominatimClient::from_config(&config.geocoder)?;
    let tracking = Arc::new(TrackingService::new(
        store,
        Resolver::new(Arc::new(geocoder)),
        TrackingSettings::from_config(&config.geocoder, &config.positions),
    ));

    let app = create_app(tracking, &config.cors);
    let addr = config.server.socket_addr()?;

    run_server(app, addr, async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Received shutdown signal");
    })
    .await?;

    // Store handle is dropped here, closing the pool
    Ok(())
}
