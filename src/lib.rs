//! Vehicle position tracking service
//!
//! Vehicles report coordinates; reports are enriched with a reverse geocoded
//! place name and stored in a document store, which the HTTP API queries.

pub mod config;
pub mod database;
pub mod errors;
pub mod geocoding;
pub mod models;
pub mod server;
pub mod tracking;
