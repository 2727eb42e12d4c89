//! Author↔Title links (N:M relationship with order and royalty share)

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::{
    error::{CatalogError, CatalogResult},
    ids::{AuthorId, TitleId},
};

/// Share assumed when a link does not declare one
pub const DEFAULT_ROYALTY_SHARE: i32 = 100;

/// Link row joining one author to one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Relation {
    #[schema(value_type = String)]
    pub au_id: AuthorId,
    #[schema(value_type = String)]
    pub title_id: TitleId,
    pub contribution_order: i32,
    pub royalty_share_percent: i32,
}

impl Relation {
    /// Display/iteration order among co-authors: contribution order, then author id.
    pub fn sort_key(&self) -> (i32, &AuthorId) {
        (self.contribution_order, &self.au_id)
    }
}

/// Author reference supplied when creating a title or replacing its author list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelationInput {
    #[schema(value_type = String, example = "172-32-1176")]
    pub au_id: AuthorId,
    pub royalty_share_percent: Option<i32>,
    pub contribution_order: Option<i32>,
}

impl RelationInput {
    pub fn new(au_id: AuthorId) -> Self {
        Self {
            au_id,
            royalty_share_percent: None,
            contribution_order: None,
        }
    }
}

/// A validated author link that is not yet bound to a title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub au_id: AuthorId,
    pub contribution_order: i32,
    pub royalty_share_percent: i32,
}

impl PlannedLink {
    pub fn to_relation(&self, title_id: &TitleId) -> Relation {
        Relation {
            au_id: self.au_id.clone(),
            title_id: title_id.clone(),
            contribution_order: self.contribution_order,
            royalty_share_percent: self.royalty_share_percent,
        }
    }
}

/// Validate caller-supplied author references and fill in their defaults.
///
/// Unspecified orders take the 1-based list position, unspecified shares
/// default to 100 each (no redistribution among co-authors). The result is
/// sorted by contribution order, ties by author id.
pub fn plan_links(inputs: &[RelationInput]) -> CatalogResult<Vec<PlannedLink>> {
    if inputs.is_empty() {
        return Err(CatalogError::validation(
            "authors",
            "A title needs at least one author",
        ));
    }

    let mut seen_authors = HashSet::new();
    let mut seen_orders = HashSet::new();
    let mut links = Vec::with_capacity(inputs.len());

    for (idx, input) in inputs.iter().enumerate() {
        if !seen_authors.insert(&input.au_id) {
            return Err(CatalogError::validation(
                "authors",
                format!("Author {} is listed more than once", input.au_id),
            ));
        }

        let contribution_order = input.contribution_order.unwrap_or(idx as i32 + 1);
        if contribution_order < 1 {
            return Err(CatalogError::validation(
                "contribution_order",
                format!("Contribution order must be positive, got {}", contribution_order),
            ));
        }
        if !seen_orders.insert(contribution_order) {
            return Err(CatalogError::validation(
                "contribution_order",
                format!("Contribution order {} is used twice", contribution_order),
            ));
        }

        let royalty_share_percent = input.royalty_share_percent.unwrap_or(DEFAULT_ROYALTY_SHARE);
        if !(0..=100).contains(&royalty_share_percent) {
            return Err(CatalogError::validation(
                "royalty_share_percent",
                format!("Royalty share must be between 0 and 100, got {}", royalty_share_percent),
            ));
        }

        links.push(PlannedLink {
            au_id: input.au_id.clone(),
            contribution_order,
            royalty_share_percent,
        });
    }

    links.sort_by(|a, b| {
        a.contribution_order
            .cmp(&b.contribution_order)
            .then_with(|| a.au_id.cmp(&b.au_id))
    });
    Ok(links)
}

/// Plan the link rows replacing the author list of an existing title
pub fn plan_relations(title_id: &TitleId, inputs: &[RelationInput]) -> CatalogResult<Vec<Relation>> {
    Ok(plan_links(inputs)?
        .iter()
        .map(|link| link.to_relation(title_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid() -> TitleId {
        TitleId::parse("PS2091").unwrap()
    }

    fn input(id: &str) -> RelationInput {
        RelationInput::new(AuthorId::parse(id).unwrap())
    }

    #[test]
    fn test_orders_follow_input_position() {
        let rels = plan_relations(&tid(), &[input("998-72-3567"), input("899-46-2035")]).unwrap();
        assert_eq!(rels[0].au_id.as_str(), "998-72-3567");
        assert_eq!(rels[0].contribution_order, 1);
        assert_eq!(rels[1].au_id.as_str(), "899-46-2035");
        assert_eq!(rels[1].contribution_order, 2);
        assert!(rels.iter().all(|r| r.royalty_share_percent == 100));
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let mut a = input("998-72-3567");
        a.contribution_order = Some(5);
        a.royalty_share_percent = Some(40);
        let mut b = input("899-46-2035");
        b.royalty_share_percent = Some(60);
        let rels = plan_relations(&tid(), &[a, b]).unwrap();
        assert_eq!(rels[0].au_id.as_str(), "899-46-2035");
        assert_eq!((rels[0].contribution_order, rels[0].royalty_share_percent), (2, 60));
        assert_eq!((rels[1].contribution_order, rels[1].royalty_share_percent), (5, 40));
    }

    #[test]
    fn test_links_are_planned_before_a_title_exists() {
        let mut late = input("899-46-2035");
        late.contribution_order = Some(3);
        let links = plan_links(&[late, input("998-72-3567")]).unwrap();
        assert_eq!(links[0].au_id.as_str(), "998-72-3567");
        assert_eq!(links[0].contribution_order, 2);
        assert_eq!(links[1].contribution_order, 3);

        let bound = links[1].to_relation(&tid());
        assert_eq!(bound.title_id, tid());
        assert_eq!(bound.au_id.as_str(), "899-46-2035");
        assert_eq!(bound.royalty_share_percent, 100);
    }

    #[test]
    fn test_rejects_bad_lists() {
        assert!(plan_relations(&tid(), &[]).is_err());
        assert!(plan_relations(&tid(), &[input("998-72-3567"), input("998-72-3567")]).is_err());

        let mut clash = input("899-46-2035");
        clash.contribution_order = Some(1);
        assert!(plan_relations(&tid(), &[input("998-72-3567"), clash]).is_err());

        let mut zero = input("899-46-2035");
        zero.contribution_order = Some(0);
        assert!(plan_relations(&tid(), &[zero]).is_err());

        let mut share = input("899-46-2035");
        share.royalty_share_percent = Some(101);
        assert!(plan_relations(&tid(), &[share]).is_err());
    }
}
