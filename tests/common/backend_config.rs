//! Backend configuration for tests.
//!
//! The in-process backend always runs. PostgreSQL and MongoDB run only when
//! `DATABASE_URL` / `MONGODB_URL` point at a live server.

use std::env;
use std::sync::Arc;

use bookshelf_server::{
    config::{DatabaseConfig, DocumentConfig},
    error::CatalogResult,
    store::{CatalogStore, DocumentStore, MemoryStore, RelationalStore},
};

/// Database used by the document suite, kept apart from the server's own
const DOCUMENT_TEST_DATABASE: &str = "bookshelf_test";

#[derive(Debug, Clone)]
pub enum TestBackend {
    Memory,
    /// PostgreSQL connection string
    Relational(String),
    /// MongoDB connection string (replica set)
    Document(String),
}

impl TestBackend {
    pub fn memory() -> Option<Self> {
        Some(TestBackend::Memory)
    }

    pub fn relational_from_env() -> Option<Self> {
        env::var("DATABASE_URL").ok().map(TestBackend::Relational)
    }

    pub fn document_from_env() -> Option<Self> {
        env::var("MONGODB_URL").ok().map(TestBackend::Document)
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            TestBackend::Memory => "memory",
            TestBackend::Relational(_) => "relational",
            TestBackend::Document(_) => "document",
        }
    }

    pub async fn connect(&self) -> CatalogResult<Arc<dyn CatalogStore>> {
        let store: Arc<dyn CatalogStore> = match self {
            TestBackend::Memory => Arc::new(MemoryStore::new()),
            TestBackend::Relational(url) => Arc::new(
                RelationalStore::connect(&DatabaseConfig {
                    url: url.clone(),
                    ..DatabaseConfig::default()
                })
                .await?,
            ),
            TestBackend::Document(url) => Arc::new(
                DocumentStore::connect(&DocumentConfig {
                    url: url.clone(),
                    database: DOCUMENT_TEST_DATABASE.to_string(),
                })
                .await?,
            ),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_str() {
        assert_eq!(TestBackend::Memory.kind_str(), "memory");
        assert_eq!(
            TestBackend::Relational("postgres://localhost/x".into()).kind_str(),
            "relational"
        );
        assert_eq!(
            TestBackend::Document("mongodb://localhost".into()).kind_str(),
            "document"
        );
    }
}
