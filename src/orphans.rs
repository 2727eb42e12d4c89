//! Orphan resolution.
//!
//! Pure computations over a snapshot of relation sets: which titles would be
//! left without any author, and which authors without any title, once a set
//! of links is removed. Callers must build the snapshot from reads made in
//! the same transaction scope as the writes that follow.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ids::{AuthorId, TitleId},
    models::Relation,
};

/// Current relation sets, indexed from both sides
#[derive(Debug, Clone, Default)]
pub struct RelationSnapshot {
    by_title: BTreeMap<TitleId, BTreeSet<AuthorId>>,
    by_author: BTreeMap<AuthorId, BTreeSet<TitleId>>,
}

impl RelationSnapshot {
    pub fn new<I: IntoIterator<Item = Relation>>(relations: I) -> Self {
        let mut snapshot = Self::default();
        snapshot.extend(relations);
        snapshot
    }

    pub fn extend<I: IntoIterator<Item = Relation>>(&mut self, relations: I) {
        for rel in relations {
            self.by_title
                .entry(rel.title_id.clone())
                .or_default()
                .insert(rel.au_id.clone());
            self.by_author
                .entry(rel.au_id)
                .or_default()
                .insert(rel.title_id);
        }
    }

    pub fn authors_of(&self, title_id: &TitleId) -> Option<&BTreeSet<AuthorId>> {
        self.by_title.get(title_id)
    }

    pub fn titles_of(&self, au_id: &AuthorId) -> Option<&BTreeSet<TitleId>> {
        self.by_author.get(au_id)
    }
}

/// Outcome of removing a set of links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadePlan {
    /// Titles whose last link is removed; they must be deleted.
    pub orphaned_titles: BTreeSet<TitleId>,
    /// Authors whose last link is removed. Informational only, authors are never cascaded.
    pub authors_without_titles: BTreeSet<AuthorId>,
}

/// Resolve the cascade for removing the given `(author, title)` links.
///
/// Links absent from the snapshot are ignored; a title or author only counts
/// as orphaned if it had at least one link before the removal.
pub fn resolve(removals: &[(AuthorId, TitleId)], snapshot: &RelationSnapshot) -> CascadePlan {
    let mut remaining_by_title: BTreeMap<&TitleId, BTreeSet<&AuthorId>> = BTreeMap::new();
    let mut remaining_by_author: BTreeMap<&AuthorId, BTreeSet<&TitleId>> = BTreeMap::new();

    for (au_id, title_id) in removals {
        let Some(authors) = snapshot.authors_of(title_id) else {
            continue;
        };
        if !authors.contains(au_id) {
            continue;
        }
        remaining_by_title
            .entry(title_id)
            .or_insert_with(|| authors.iter().collect())
            .remove(au_id);
        if let Some(titles) = snapshot.titles_of(au_id) {
            remaining_by_author
                .entry(au_id)
                .or_insert_with(|| titles.iter().collect())
                .remove(title_id);
        }
    }

    CascadePlan {
        orphaned_titles: remaining_by_title
            .into_iter()
            .filter(|(_, remaining)| remaining.is_empty())
            .map(|(title_id, _)| title_id.clone())
            .collect(),
        authors_without_titles: remaining_by_author
            .into_iter()
            .filter(|(_, remaining)| remaining.is_empty())
            .map(|(au_id, _)| au_id.clone())
            .collect(),
    }
}

/// Titles that lose their last author when every link naming `au_id` is removed,
/// i.e. the titles `au_id` is currently the sole author of.
pub fn compute_title_cascade(au_id: &AuthorId, snapshot: &RelationSnapshot) -> BTreeSet<TitleId> {
    let removals: Vec<(AuthorId, TitleId)> = snapshot
        .titles_of(au_id)
        .into_iter()
        .flatten()
        .map(|title_id| (au_id.clone(), title_id.clone()))
        .collect();
    resolve(&removals, snapshot).orphaned_titles
}
