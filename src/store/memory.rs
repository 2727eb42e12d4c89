//! In-process backend.
//!
//! A scope holds the store lock for its whole lifetime, so scopes are fully
//! serialized. Writes are applied in place and journaled; abort (or dropping
//! an unfinished scope) replays the journal backwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{CatalogStore, StoreScope};
use crate::{
    error::{CatalogError, CatalogResult, Entity},
    ids::{AuthorId, TitleId},
    models::{Author, AuthorTitle, Relation, Title, TitleAuthor, TitleWithAuthors},
};

#[derive(Debug, Default)]
struct CatalogState {
    authors: BTreeMap<AuthorId, Author>,
    titles: BTreeMap<TitleId, Title>,
    relations: BTreeMap<(TitleId, AuthorId), Relation>,
}

impl CatalogState {
    fn title_with_authors(&self, title: &Title) -> TitleWithAuthors {
        let authors = self
            .relations_of_title(&title.title_id)
            .into_iter()
            .filter_map(|rel| {
                self.authors.get(&rel.au_id).map(|a| TitleAuthor {
                    au_id: a.au_id.clone(),
                    first_name: a.first_name.clone(),
                    last_name: a.last_name.clone(),
                    contribution_order: rel.contribution_order,
                    royalty_share_percent: rel.royalty_share_percent,
                })
            })
            .collect();
        TitleWithAuthors::new(title.clone(), authors)
    }

    fn relations_of_title(&self, title_id: &TitleId) -> Vec<Relation> {
        let mut relations: Vec<Relation> = self
            .relations
            .iter()
            .filter(|((t, _), _)| t == title_id)
            .map(|(_, rel)| rel.clone())
            .collect();
        relations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        relations
    }

    fn relations_of_author(&self, au_id: &AuthorId) -> Vec<Relation> {
        // keyed by title first, so this is a scan; results come out in title order
        self.relations
            .values()
            .filter(|rel| &rel.au_id == au_id)
            .cloned()
            .collect()
    }
}

/// Previous value of an entry touched inside a scope
enum Undo {
    Author(AuthorId, Option<Author>),
    Title(TitleId, Option<Title>),
    Relation((TitleId, AuthorId), Option<Relation>),
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<CatalogState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> CatalogResult<()> {
        Ok(())
    }

    async fn open(&self) -> CatalogResult<Box<dyn StoreScope>> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(MemoryScope {
            state: guard,
            journal: Vec::new(),
            finished: false,
        }))
    }

    async fn list_authors(&self) -> CatalogResult<Vec<Author>> {
        Ok(self.state.lock().await.authors.values().cloned().collect())
    }

    async fn find_author(&self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        Ok(self.state.lock().await.authors.get(au_id).cloned())
    }

    async fn find_title(&self, title_id: &TitleId) -> CatalogResult<Option<TitleWithAuthors>> {
        let state = self.state.lock().await;
        Ok(state
            .titles
            .get(title_id)
            .map(|t| state.title_with_authors(t)))
    }

    async fn list_titles_with_authors(&self) -> CatalogResult<Vec<TitleWithAuthors>> {
        let state = self.state.lock().await;
        Ok(state
            .titles
            .values()
            .map(|t| state.title_with_authors(t))
            .collect())
    }

    async fn list_titles_by_author(&self, au_id: &AuthorId) -> CatalogResult<Vec<AuthorTitle>> {
        let state = self.state.lock().await;
        Ok(state
            .relations_of_author(au_id)
            .into_iter()
            .filter_map(|rel| {
                state.titles.get(&rel.title_id).map(|t| AuthorTitle {
                    title_id: t.title_id.clone(),
                    name: t.name.clone(),
                    category: t.category.clone(),
                    price: t.price,
                    publication_date: t.publication_date,
                    royalty_share_percent: rel.royalty_share_percent,
                })
            })
            .collect())
    }
}

pub struct MemoryScope {
    state: OwnedMutexGuard<CatalogState>,
    journal: Vec<Undo>,
    finished: bool,
}

impl MemoryScope {
    fn put_author(&mut self, au_id: AuthorId, value: Option<Author>) {
        let previous = match value {
            Some(a) => self.state.authors.insert(au_id.clone(), a),
            None => self.state.authors.remove(&au_id),
        };
        self.journal.push(Undo::Author(au_id, previous));
    }

    fn put_title(&mut self, title_id: TitleId, value: Option<Title>) {
        let previous = match value {
            Some(t) => self.state.titles.insert(title_id.clone(), t),
            None => self.state.titles.remove(&title_id),
        };
        self.journal.push(Undo::Title(title_id, previous));
    }

    fn put_relation(&mut self, key: (TitleId, AuthorId), value: Option<Relation>) {
        let previous = match value {
            Some(r) => self.state.relations.insert(key.clone(), r),
            None => self.state.relations.remove(&key),
        };
        self.journal.push(Undo::Relation(key, previous));
    }

    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Author(id, Some(a)) => {
                    self.state.authors.insert(id, a);
                }
                Undo::Author(id, None) => {
                    self.state.authors.remove(&id);
                }
                Undo::Title(id, Some(t)) => {
                    self.state.titles.insert(id, t);
                }
                Undo::Title(id, None) => {
                    self.state.titles.remove(&id);
                }
                Undo::Relation(key, Some(r)) => {
                    self.state.relations.insert(key, r);
                }
                Undo::Relation(key, None) => {
                    self.state.relations.remove(&key);
                }
            }
        }
    }

    fn relation_key(au_id: &AuthorId, title_id: &TitleId) -> (TitleId, AuthorId) {
        (title_id.clone(), au_id.clone())
    }

    fn check_link_targets(&self, relation: &Relation) -> CatalogResult<()> {
        if !self.state.authors.contains_key(&relation.au_id) {
            return Err(CatalogError::not_found(Entity::Author, &relation.au_id));
        }
        if !self.state.titles.contains_key(&relation.title_id) {
            return Err(CatalogError::not_found(Entity::Title, &relation.title_id));
        }
        Ok(())
    }
}

impl Drop for MemoryScope {
    fn drop(&mut self) {
        if !self.finished && !self.journal.is_empty() {
            self.rollback();
        }
    }
}

#[async_trait]
impl StoreScope for MemoryScope {
    async fn author(&mut self, au_id: &AuthorId) -> CatalogResult<Option<Author>> {
        Ok(self.state.authors.get(au_id).cloned())
    }

    async fn insert_author(&mut self, author: &Author) -> CatalogResult<bool> {
        if self.state.authors.contains_key(&author.au_id) {
            return Ok(false);
        }
        self.put_author(author.au_id.clone(), Some(author.clone()));
        Ok(true)
    }

    async fn replace_author(&mut self, author: &Author) -> CatalogResult<()> {
        if !self.state.authors.contains_key(&author.au_id) {
            return Err(CatalogError::not_found(Entity::Author, &author.au_id));
        }
        self.put_author(author.au_id.clone(), Some(author.clone()));
        Ok(())
    }

    async fn delete_author(&mut self, au_id: &AuthorId) -> CatalogResult<bool> {
        if !self.state.authors.contains_key(au_id) {
            return Ok(false);
        }
        // same guarantee the relational foreign key gives
        if self.state.relations.values().any(|r| &r.au_id == au_id) {
            return Err(CatalogError::Storage(format!(
                "author {} still has links",
                au_id
            )));
        }
        self.put_author(au_id.clone(), None);
        Ok(true)
    }

    async fn title(&mut self, title_id: &TitleId) -> CatalogResult<Option<Title>> {
        Ok(self.state.titles.get(title_id).cloned())
    }

    async fn insert_title(&mut self, title: &Title, relations: &[Relation]) -> CatalogResult<bool> {
        if self.state.titles.contains_key(&title.title_id) {
            return Ok(false);
        }
        self.put_title(title.title_id.clone(), Some(title.clone()));
        for relation in relations {
            self.link(relation).await?;
        }
        Ok(true)
    }

    async fn replace_title(&mut self, title: &Title) -> CatalogResult<()> {
        if !self.state.titles.contains_key(&title.title_id) {
            return Err(CatalogError::not_found(Entity::Title, &title.title_id));
        }
        self.put_title(title.title_id.clone(), Some(title.clone()));
        Ok(())
    }

    async fn delete_title(&mut self, title_id: &TitleId) -> CatalogResult<bool> {
        for relation in self.state.relations_of_title(title_id) {
            self.put_relation(Self::relation_key(&relation.au_id, title_id), None);
        }
        if !self.state.titles.contains_key(title_id) {
            return Ok(false);
        }
        self.put_title(title_id.clone(), None);
        Ok(true)
    }

    async fn relations_of_title(&mut self, title_id: &TitleId) -> CatalogResult<Vec<Relation>> {
        Ok(self.state.relations_of_title(title_id))
    }

    async fn relations_of_author(&mut self, au_id: &AuthorId) -> CatalogResult<Vec<Relation>> {
        Ok(self.state.relations_of_author(au_id))
    }

    async fn link(&mut self, relation: &Relation) -> CatalogResult<()> {
        self.check_link_targets(relation)?;
        let key = Self::relation_key(&relation.au_id, &relation.title_id);
        if self.state.relations.contains_key(&key) {
            return Err(CatalogError::Conflict(format!(
                "author {} is already linked to title {}",
                relation.au_id, relation.title_id
            )));
        }
        self.put_relation(key, Some(relation.clone()));
        Ok(())
    }

    async fn update_link(&mut self, relation: &Relation) -> CatalogResult<()> {
        let key = Self::relation_key(&relation.au_id, &relation.title_id);
        if !self.state.relations.contains_key(&key) {
            return Err(CatalogError::not_found(
                Entity::Relation,
                format!("{}/{}", relation.au_id, relation.title_id),
            ));
        }
        self.put_relation(key, Some(relation.clone()));
        Ok(())
    }

    async fn unlink(&mut self, au_id: &AuthorId, title_id: &TitleId) -> CatalogResult<bool> {
        let key = Self::relation_key(au_id, title_id);
        if !self.state.relations.contains_key(&key) {
            return Ok(false);
        }
        self.put_relation(key, None);
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let mut scope = self;
        scope.journal.clear();
        scope.finished = true;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> CatalogResult<()> {
        let mut scope = self;
        scope.rollback();
        scope.finished = true;
        Ok(())
    }
}
