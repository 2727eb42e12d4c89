//! Business logic services

pub mod catalog;
mod units;

use std::sync::Arc;

use crate::{config::CatalogConfig, store::CatalogStore};

pub use units::DeletionReport;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
}

impl Services {
    /// Create all services on top of the given store handle
    pub fn new(store: Arc<dyn CatalogStore>, config: &CatalogConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store, config),
        }
    }
}
