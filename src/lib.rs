//! Homesite data service - the data-access layer behind a personal site
//! and its admin dashboard.
//!
//! Two independent subsystems compose the layer: an in-process [`cache`]
//! with TTL expiry and tag-based invalidation, and a [`database`]
//! connection manager owning a pooled native MongoDB client plus a
//! document-mapper session. Request handlers read through the cache and
//! reach the database through the manager; mutations invalidate by tag
//! after a successful write.

use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod routes;

pub use error::{AppError, Result};

use cache::Cache;
use config::Config;
use database::MongoConnectionManager;

/// Application state shared across handlers. Constructed once at startup
/// and injected everywhere; tests build their own instance.
#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db: MongoConnectionManager,
    pub cache: Arc<Cache<serde_json::Value>>,
}
