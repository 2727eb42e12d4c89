//! Bookshelf catalog server
//!
//! Authors and titles joined by a many-to-many relation carrying contribution
//! order and royalty share. The same integrity rules (no dangling link, no
//! title without an author) hold on every storage backend: normalized tables
//! in PostgreSQL, title documents with embedded author links in MongoDB, or an
//! in-process store.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ids;
pub mod models;
pub mod orphans;
pub mod services;
pub mod store;

pub use config::AppConfig;
pub use error::{CatalogError, CatalogResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
