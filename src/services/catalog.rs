//! Catalog service: authors, titles and the links between them

use std::sync::Arc;

use crate::{
    config::CatalogConfig,
    coordinator::TransactionCoordinator,
    error::{CatalogError, CatalogResult, Entity},
    ids::{AuthorId, TitleId},
    models::{
        relation::{plan_links, plan_relations},
        Author, AuthorPatch, AuthorTitle, CreateAuthor, CreateTitle, TitleWithAuthors, UpdateTitle,
    },
    store::CatalogStore,
};

use super::units::{
    CreateAuthorUnit, CreateTitleUnit, DeleteAuthorUnit, DeleteTitleUnit, DeletionReport,
    UpdateAuthorUnit, UpdateTitleUnit,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    coordinator: TransactionCoordinator,
    id_attempts: u32,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, config: &CatalogConfig) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store.clone(), config.transaction_attempts),
            store,
            id_attempts: config.id_attempts.max(1),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Check that the backend answers
    pub async fn ping(&self) -> CatalogResult<()> {
        self.store.ping().await
    }

    // =========================================================================
    // Authors
    // =========================================================================

    /// List all authors, ordered by id
    pub async fn list_authors(&self) -> CatalogResult<Vec<Author>> {
        self.store.list_authors().await
    }

    pub async fn get_author(&self, au_id: &AuthorId) -> CatalogResult<Author> {
        self.store
            .find_author(au_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(Entity::Author, au_id))
    }

    /// Create an author under a freshly generated id
    pub async fn create_author(&self, fields: CreateAuthor) -> CatalogResult<AuthorId> {
        let unit = CreateAuthorUnit {
            fields: fields.normalized()?,
            id_attempts: self.id_attempts,
        };
        let au_id = self.coordinator.execute(&unit).await?;
        tracing::info!("Created author {}", au_id);
        Ok(au_id)
    }

    /// Partial update; only supplied fields change
    pub async fn update_author(&self, au_id: &AuthorId, patch: AuthorPatch) -> CatalogResult<()> {
        let unit = UpdateAuthorUnit {
            au_id: au_id.clone(),
            patch: patch.normalized()?,
        };
        self.coordinator.execute(&unit).await?;
        tracing::info!("Updated author {}", au_id);
        Ok(())
    }

    /// Delete an author with all its links. Titles left without any author
    /// are deleted in the same transaction.
    pub async fn delete_author(&self, au_id: &AuthorId) -> CatalogResult<DeletionReport> {
        let unit = DeleteAuthorUnit {
            au_id: au_id.clone(),
        };
        let report = self.coordinator.execute(&unit).await?;
        tracing::info!(
            "Deleted author {} ({} orphaned titles removed)",
            au_id,
            report.removed_titles.len()
        );
        Ok(report)
    }

    /// Titles the author contributes to
    pub async fn list_titles_by_author(&self, au_id: &AuthorId) -> CatalogResult<Vec<AuthorTitle>> {
        self.get_author(au_id).await?;
        self.store.list_titles_by_author(au_id).await
    }

    // =========================================================================
    // Titles
    // =========================================================================

    /// All titles with their authors in contribution order
    pub async fn list_titles_with_authors(&self) -> CatalogResult<Vec<TitleWithAuthors>> {
        self.store.list_titles_with_authors().await
    }

    pub async fn get_title(&self, title_id: &TitleId) -> CatalogResult<TitleWithAuthors> {
        self.store
            .find_title(title_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(Entity::Title, title_id))
    }

    /// Create a title linked to at least one existing author
    pub async fn create_title(&self, request: CreateTitle) -> CatalogResult<TitleId> {
        let fields = request.title.normalized()?;
        let links = plan_links(&request.authors)?;
        let unit = CreateTitleUnit {
            fields,
            links,
            id_attempts: self.id_attempts,
        };
        let title_id = self.coordinator.execute(&unit).await?;
        tracing::info!("Created title {} with {} authors", title_id, unit.links.len());
        Ok(title_id)
    }

    /// Partial update, optionally replacing the whole author list
    pub async fn update_title(&self, title_id: &TitleId, request: UpdateTitle) -> CatalogResult<()> {
        let patch = request.fields.normalized()?;
        let relations = match request.authors {
            Some(inputs) => Some(plan_relations(title_id, &inputs)?),
            None => None,
        };
        let unit = UpdateTitleUnit {
            title_id: title_id.clone(),
            patch,
            relations,
        };
        self.coordinator.execute(&unit).await?;
        tracing::info!("Updated title {}", title_id);
        Ok(())
    }

    /// Delete a title and all its links
    pub async fn delete_title(&self, title_id: &TitleId) -> CatalogResult<()> {
        let unit = DeleteTitleUnit {
            title_id: title_id.clone(),
        };
        self.coordinator.execute(&unit).await?;
        tracing::info!("Deleted title {}", title_id);
        Ok(())
    }
}
