//! Storage layer.
//!
//! `CatalogStore` is the handle to one backend; `StoreScope` is an open,
//! storage-native transaction on it. Everything above this module talks to
//! the catalog only through these two traits, so the cascade and transaction
//! logic is written once for every backend:
//!
//! | Backend | Module | Relation shape |
//! |---------|--------|----------------|
//! | PostgreSQL | [`relational`] | `title_authors` join table |
//! | MongoDB | [`document`] | `authors` array embedded in each title document |
//! | In-process | [`memory`] | link map, journaled writes |

pub mod document;
pub mod memory;
pub mod relational;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    config::{AppConfig, StorageBackend},
    error::{CatalogError, CatalogResult},
    ids::{AuthorId, TitleId},
    models::{Author, AuthorTitle, Relation, Title, TitleWithAuthors},
};

pub use document::DocumentStore;
pub use memory::MemoryStore;
pub use relational::RelationalStore;

/// Handle to a catalog backend
#[async_trait]
pub trait CatalogStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Round-trip to the backend.
    async fn ping(&self) -> CatalogResult<()>;

    /// Begin a storage-native transaction.
    async fn open(&self) -> CatalogResult<Box<dyn StoreScope>>;

    // =========================================================================
    // Unscoped reads (list views tolerate eventual consistency)
    // =========================================================================

    async fn list_authors(&self) -> CatalogResult<Vec<Author>>;

    async fn find_author(&self, au_id: &AuthorId) -> CatalogResult<Option<Author>>;

    async fn find_title(&self, title_id: &TitleId) -> CatalogResult<Option<TitleWithAuthors>>;

    /// Every title joined with its authors, ordered by title id; authors are
    /// ordered by contribution order, ties by author id.
    async fn list_titles_with_authors(&self) -> CatalogResult<Vec<TitleWithAuthors>>;

    /// Titles one author is linked to, ordered by title id.
    async fn list_titles_by_author(&self, au_id: &AuthorId) -> CatalogResult<Vec<AuthorTitle>>;
}

/// An open transaction scope on a backend.
///
/// Reads see the scope's own writes. Entity reads take whatever lock the
/// backend offers, so concurrent scopes touching the same author or title
/// serialize or fail with a retryable `Conflict`.
#[async_trait]
pub trait StoreScope: Send {
    // =========================================================================
    // Authors
    // =========================================================================

    async fn author(&mut self, au_id: &AuthorId) -> CatalogResult<Option<Author>>;

    /// Insert a new author. Returns `false` if the id is already taken.
    async fn insert_author(&mut self, author: &Author) -> CatalogResult<bool>;

    /// Overwrite every field of an existing author.
    async fn replace_author(&mut self, author: &Author) -> CatalogResult<()>;

    /// Remove the author record. Links must have been removed beforehand.
    async fn delete_author(&mut self, au_id: &AuthorId) -> CatalogResult<bool>;

    // =========================================================================
    // Titles
    // =========================================================================

    async fn title(&mut self, title_id: &TitleId) -> CatalogResult<Option<Title>>;

    /// Insert a new title together with its links. Returns `false` if the id is already taken.
    async fn insert_title(&mut self, title: &Title, relations: &[Relation]) -> CatalogResult<bool>;

    /// Overwrite the bibliographic fields of an existing title, leaving its links alone.
    async fn replace_title(&mut self, title: &Title) -> CatalogResult<()>;

    /// Remove a title and all of its links.
    async fn delete_title(&mut self, title_id: &TitleId) -> CatalogResult<bool>;

    // =========================================================================
    // Relation sets
    // =========================================================================

    /// Links of one title, ordered by contribution order then author id.
    async fn relations_of_title(&mut self, title_id: &TitleId) -> CatalogResult<Vec<Relation>>;

    /// Links of one author, ordered by title id.
    async fn relations_of_author(&mut self, au_id: &AuthorId) -> CatalogResult<Vec<Relation>>;

    async fn link(&mut self, relation: &Relation) -> CatalogResult<()>;

    /// Update order and share of an existing link.
    async fn update_link(&mut self, relation: &Relation) -> CatalogResult<()>;

    async fn unlink(&mut self, au_id: &AuthorId, title_id: &TitleId) -> CatalogResult<bool>;

    // =========================================================================
    // Completion
    // =========================================================================

    async fn commit(self: Box<Self>) -> CatalogResult<()>;

    async fn abort(self: Box<Self>) -> CatalogResult<()>;
}

/// Connect to the configured backend, retrying a bounded number of times.
pub async fn connect(config: &AppConfig) -> CatalogResult<Arc<dyn CatalogStore>> {
    let attempts = config.storage.connect_attempts.max(1);
    let backoff = Duration::from_millis(config.storage.connect_backoff_ms);
    let mut attempt = 1;

    loop {
        let result: CatalogResult<Arc<dyn CatalogStore>> = match config.storage.backend {
            StorageBackend::Relational => RelationalStore::connect(&config.database)
                .await
                .map(|s| Arc::new(s) as Arc<dyn CatalogStore>),
            StorageBackend::Document => DocumentStore::connect(&config.document)
                .await
                .map(|s| Arc::new(s) as Arc<dyn CatalogStore>),
            StorageBackend::Memory => Ok(Arc::new(MemoryStore::new()) as Arc<dyn CatalogStore>),
        };

        match result {
            Ok(store) => {
                tracing::info!("Connected to {} storage", store.backend_name());
                return Ok(store);
            }
            Err(CatalogError::StorageUnavailable(msg)) if attempt < attempts => {
                tracing::warn!(
                    "Storage not reachable (attempt {}/{}): {}; retrying in {:?}",
                    attempt,
                    attempts,
                    msg,
                    backoff
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
