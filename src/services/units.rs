//! Mutating catalog operations, each run by the coordinator inside one scope.
//!
//! Every unit reads what it is about to change through the scope first, so
//! the backend's row/document locks (or write-conflict detection) cover the
//! whole read-plan-write sequence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    coordinator::UnitOfWork,
    error::{CatalogError, CatalogResult, Entity},
    ids::{new_author_id, new_title_id, AuthorId, TitleId},
    models::{AuthorPatch, CreateAuthor, NewTitle, PlannedLink, Relation, TitlePatch},
    orphans::{self, RelationSnapshot},
    store::StoreScope,
};

/// Outcome of an author deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DeletionReport {
    /// Titles deleted because the author was their only one
    #[schema(value_type = Vec<String>)]
    pub removed_titles: Vec<TitleId>,
}

async fn ensure_authors_exist(
    scope: &mut dyn StoreScope,
    au_ids: Vec<&AuthorId>,
) -> CatalogResult<()> {
    for au_id in au_ids {
        if scope.author(au_id).await?.is_none() {
            return Err(CatalogError::not_found(Entity::Author, au_id));
        }
    }
    Ok(())
}

// =============================================================================
// Authors
// =============================================================================

pub(crate) struct CreateAuthorUnit {
    pub fields: CreateAuthor,
    pub id_attempts: u32,
}

#[async_trait]
impl UnitOfWork for CreateAuthorUnit {
    type Output = AuthorId;

    fn label(&self) -> &'static str {
        "create_author"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<AuthorId> {
        for attempt in 1..=self.id_attempts {
            let au_id = new_author_id();
            let author = self.fields.clone().into_author(au_id.clone());
            if scope.insert_author(&author).await? {
                return Ok(au_id);
            }
            tracing::debug!(
                "Author id {} already taken (attempt {}/{})",
                au_id,
                attempt,
                self.id_attempts
            );
        }
        tracing::warn!("No free author id after {} attempts", self.id_attempts);
        Err(CatalogError::IdsExhausted {
            entity: Entity::Author,
            attempts: self.id_attempts,
        })
    }
}

pub(crate) struct UpdateAuthorUnit {
    pub au_id: AuthorId,
    pub patch: AuthorPatch,
}

#[async_trait]
impl UnitOfWork for UpdateAuthorUnit {
    type Output = ();

    fn label(&self) -> &'static str {
        "update_author"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<()> {
        let mut author = scope
            .author(&self.au_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(Entity::Author, &self.au_id))?;
        self.patch.clone().apply_to(&mut author);
        scope.replace_author(&author).await
    }
}

pub(crate) struct DeleteAuthorUnit {
    pub au_id: AuthorId,
}

#[async_trait]
impl UnitOfWork for DeleteAuthorUnit {
    type Output = DeletionReport;

    fn label(&self) -> &'static str {
        "delete_author"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<DeletionReport> {
        if scope.author(&self.au_id).await?.is_none() {
            return Err(CatalogError::not_found(Entity::Author, &self.au_id));
        }

        // Consistent view of every title this author touches, read under lock
        let links = scope.relations_of_author(&self.au_id).await?;
        let mut snapshot = RelationSnapshot::new(links.clone());
        for link in &links {
            if scope.title(&link.title_id).await?.is_some() {
                snapshot.extend(scope.relations_of_title(&link.title_id).await?);
            }
        }
        let cascade = orphans::compute_title_cascade(&self.au_id, &snapshot);

        for link in &links {
            scope.unlink(&self.au_id, &link.title_id).await?;
        }
        for title_id in &cascade {
            scope.delete_title(title_id).await?;
        }
        if !scope.delete_author(&self.au_id).await? {
            return Err(CatalogError::not_found(Entity::Author, &self.au_id));
        }

        Ok(DeletionReport {
            removed_titles: cascade.into_iter().collect(),
        })
    }
}

// =============================================================================
// Titles
// =============================================================================

pub(crate) struct CreateTitleUnit {
    pub fields: NewTitle,
    /// Bound to each candidate id in turn
    pub links: Vec<PlannedLink>,
    pub id_attempts: u32,
}

#[async_trait]
impl UnitOfWork for CreateTitleUnit {
    type Output = TitleId;

    fn label(&self) -> &'static str {
        "create_title"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<TitleId> {
        ensure_authors_exist(scope, self.links.iter().map(|l| &l.au_id).collect()).await?;

        for attempt in 1..=self.id_attempts {
            let title_id = new_title_id();
            let relations: Vec<Relation> = self
                .links
                .iter()
                .map(|link| link.to_relation(&title_id))
                .collect();
            let title = self.fields.clone().into_title(title_id.clone());
            if scope.insert_title(&title, &relations).await? {
                return Ok(title_id);
            }
            tracing::debug!(
                "Title id {} already taken (attempt {}/{})",
                title_id,
                attempt,
                self.id_attempts
            );
        }
        tracing::warn!("No free title id after {} attempts", self.id_attempts);
        Err(CatalogError::IdsExhausted {
            entity: Entity::Title,
            attempts: self.id_attempts,
        })
    }
}

pub(crate) struct UpdateTitleUnit {
    pub title_id: TitleId,
    pub patch: TitlePatch,
    /// Full replacement of the author list, already planned
    pub relations: Option<Vec<Relation>>,
}

#[async_trait]
impl UnitOfWork for UpdateTitleUnit {
    type Output = ();

    fn label(&self) -> &'static str {
        "update_title"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<()> {
        let mut title = scope
            .title(&self.title_id)
            .await?
            .ok_or_else(|| CatalogError::not_found(Entity::Title, &self.title_id))?;
        self.patch.clone().apply_to(&mut title);
        scope.replace_title(&title).await?;

        let Some(planned) = &self.relations else {
            return Ok(());
        };
        if planned.is_empty() {
            return Err(CatalogError::validation(
                "authors",
                "A title needs at least one author",
            ));
        }
        ensure_authors_exist(scope, planned.iter().map(|r| &r.au_id).collect()).await?;

        let current = scope.relations_of_title(&self.title_id).await?;
        let wanted: BTreeMap<&AuthorId, &Relation> =
            planned.iter().map(|r| (&r.au_id, r)).collect();

        let removals: Vec<(AuthorId, TitleId)> = current
            .iter()
            .filter(|r| !wanted.contains_key(&r.au_id))
            .map(|r| (r.au_id.clone(), r.title_id.clone()))
            .collect();

        if !removals.is_empty() {
            let mut snapshot = RelationSnapshot::new(current.iter().cloned());
            for (au_id, _) in &removals {
                snapshot.extend(scope.relations_of_author(au_id).await?);
            }
            let plan = orphans::resolve(&removals, &snapshot);
            for au_id in &plan.authors_without_titles {
                tracing::info!(
                    "Author {} no longer has any title after update of {}",
                    au_id,
                    self.title_id
                );
            }
            for (au_id, title_id) in &removals {
                scope.unlink(au_id, title_id).await?;
            }
        }

        let existing: BTreeMap<&AuthorId, &Relation> =
            current.iter().map(|r| (&r.au_id, r)).collect();
        for relation in planned {
            match existing.get(&relation.au_id) {
                Some(old) if *old == relation => {}
                Some(_) => scope.update_link(relation).await?,
                None => scope.link(relation).await?,
            }
        }
        Ok(())
    }
}

pub(crate) struct DeleteTitleUnit {
    pub title_id: TitleId,
}

#[async_trait]
impl UnitOfWork for DeleteTitleUnit {
    type Output = ();

    fn label(&self) -> &'static str {
        "delete_title"
    }

    async fn run(&self, scope: &mut dyn StoreScope) -> CatalogResult<()> {
        if scope.title(&self.title_id).await?.is_none() || !scope.delete_title(&self.title_id).await? {
            return Err(CatalogError::not_found(Entity::Title, &self.title_id));
        }
        Ok(())
    }
}
