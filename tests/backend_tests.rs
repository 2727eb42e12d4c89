//! Catalog behavior checked against every storage backend.
//!
//! The in-process suite always runs. The PostgreSQL and MongoDB suites are
//! ignored by default:
//!
//! ```text
//! DATABASE_URL=postgres://... MONGODB_URL=mongodb://...?replicaSet=rs0 \
//!     cargo test --test backend_tests -- --ignored
//! ```
//!
//! Backends may hold data from earlier runs, so every check only looks at the
//! authors and titles it created itself.

mod common;

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::json;

use bookshelf_server::{
    config::CatalogConfig,
    error::{CatalogError, Entity},
    ids::{new_author_id, AuthorId, TitleId},
    models::TitleWithAuthors,
    services::catalog::CatalogService,
};

use common::backend_config::TestBackend;

// =============================================================================
// Helpers
// =============================================================================

async fn add_author(service: &CatalogService, first: &str, last: &str) -> AuthorId {
    let fields = serde_json::from_value(json!({ "first_name": first, "last_name": last })).unwrap();
    service.create_author(fields).await.unwrap()
}

async fn add_title(service: &CatalogService, name: &str, authors: &[&AuthorId]) -> TitleId {
    let links: Vec<_> = authors.iter().map(|a| json!({ "au_id": a.as_str() })).collect();
    let request = serde_json::from_value(json!({ "name": name, "authors": links })).unwrap();
    service.create_title(request).await.unwrap()
}

fn author_ids(title: &TitleWithAuthors) -> Vec<AuthorId> {
    title.authors.iter().map(|a| a.au_id.clone()).collect()
}

fn orders(title: &TitleWithAuthors) -> Vec<i32> {
    title.authors.iter().map(|a| a.contribution_order).collect()
}

async fn unused_author_id(service: &CatalogService) -> AuthorId {
    loop {
        let candidate = new_author_id();
        if service.get_author(&candidate).await.is_err() {
            return candidate;
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

async fn check_create_title_orders(service: &CatalogService) {
    let a = add_author(service, "Michael", "O'Leary").await;
    let b = add_author(service, "Dean", "Straight").await;
    let c = add_author(service, "Abraham", "Bennet").await;

    let title_id = add_title(service, "Cooking with Computers", &[&c, &a, &b]).await;
    let title = service.get_title(&title_id).await.unwrap();

    assert_eq!(author_ids(&title), vec![c, a.clone(), b]);
    assert_eq!(orders(&title), vec![1, 2, 3]);
    assert!(title.authors.iter().all(|l| l.royalty_share_percent == 100));
    assert_eq!(
        title.author_names,
        "Abraham Bennet, Michael O'Leary, Dean Straight"
    );

    let by_a = service.list_titles_by_author(&a).await.unwrap();
    assert_eq!(by_a.len(), 1);
    assert_eq!(by_a[0].title_id, title_id);
    assert_eq!(by_a[0].royalty_share_percent, 100);
}

async fn check_values_are_stored_as_given(service: &CatalogService) {
    let long_last_name = "Blotchet-Halls".repeat(8);
    let fields = serde_json::from_value(json!({
        "first_name": "Reginald",
        "last_name": long_last_name,
        "city": "Corvallis, a city whose name is longer than forty characters"
    }))
    .unwrap();
    let a = service.create_author(fields).await.unwrap();
    let author = service.get_author(&a).await.unwrap();
    assert_eq!(author.last_name, long_last_name);

    let request = serde_json::from_value(json!({
        "name": "Straight Talk About Computers",
        "price": "19.999",
        "advance": "5000.50",
        "publication_date": "15-03-2024",
        "authors": [{ "au_id": a.as_str() }]
    }))
    .unwrap();
    let title_id = service.create_title(request).await.unwrap();
    let title = service.get_title(&title_id).await.unwrap();

    assert_eq!(title.title.price, Some(Decimal::from_str("19.999").unwrap()));
    assert_eq!(title.title.advance, Some(Decimal::from_str("5000.50").unwrap()));
    let rendered = serde_json::to_value(&title).unwrap();
    assert_eq!(rendered["publication_date"], "15-03-2024");
}

async fn check_unknown_author_writes_nothing(service: &CatalogService) {
    let a = add_author(service, "Ann", "Dull").await;
    let missing = unused_author_id(service).await;
    let request = serde_json::from_value(json!({
        "name": "Net Etiquette",
        "authors": [{ "au_id": a.as_str() }, { "au_id": missing.as_str() }]
    }))
    .unwrap();

    let err = service.create_title(request).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::NotFound {
            entity: Entity::Author,
            ..
        }
    ));
    assert!(service.list_titles_by_author(&a).await.unwrap().is_empty());
}

async fn check_replace_author_list(service: &CatalogService) {
    let a = add_author(service, "Stearns", "MacFeather").await;
    let b = add_author(service, "Livia", "Karsen").await;
    let c = add_author(service, "Sylvia", "Panteley").await;
    let title_id = add_title(service, "Computer Phobic", &[&a, &b]).await;

    // swapped orders must pass the per-title order uniqueness
    let swap = serde_json::from_value(json!({
        "authors": [
            { "au_id": b.as_str(), "royalty_share_percent": 50 },
            { "au_id": a.as_str(), "royalty_share_percent": 50 }
        ]
    }))
    .unwrap();
    service.update_title(&title_id, swap).await.unwrap();
    let title = service.get_title(&title_id).await.unwrap();
    assert_eq!(author_ids(&title), vec![b.clone(), a.clone()]);
    assert_eq!(orders(&title), vec![1, 2]);
    assert!(title.authors.iter().all(|l| l.royalty_share_percent == 50));

    let replace = serde_json::from_value(json!({ "authors": [{ "au_id": c.as_str() }] })).unwrap();
    service.update_title(&title_id, replace).await.unwrap();
    let title = service.get_title(&title_id).await.unwrap();
    assert_eq!(author_ids(&title), vec![c.clone()]);
    assert!(service.list_titles_by_author(&a).await.unwrap().is_empty());
    assert!(service.list_titles_by_author(&b).await.unwrap().is_empty());

    let empty = serde_json::from_value(json!({ "authors": [] })).unwrap();
    let err = service.update_title(&title_id, empty).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation { ref field, .. } if field == "authors"));
    assert_eq!(author_ids(&service.get_title(&title_id).await.unwrap()), vec![c]);
}

async fn check_field_update_keeps_links(service: &CatalogService) {
    let a = add_author(service, "Innes", "del Castillo").await;
    let b = add_author(service, "Michel", "DeFrance").await;
    let title_id = add_title(service, "Onions, Leeks, and Garlic", &[&a, &b]).await;

    let patch = serde_json::from_value(json!({
        "notes": "Profusely illustrated",
        "category": "trad_cook",
        "publication_date": "2024-03-15"
    }))
    .unwrap();
    service.update_title(&title_id, patch).await.unwrap();

    let title = service.get_title(&title_id).await.unwrap();
    assert_eq!(title.title.name, "Onions, Leeks, and Garlic");
    assert_eq!(title.title.notes.as_deref(), Some("Profusely illustrated"));
    assert_eq!(author_ids(&title), vec![a, b]);
    assert_eq!(orders(&title), vec![1, 2]);
}

async fn check_delete_author_cascade(service: &CatalogService) {
    let a = add_author(service, "Marjorie", "Green").await;
    let b = add_author(service, "Cheryl", "Carson").await;
    let c = add_author(service, "Reginald", "Blotchet-Halls").await;
    let t1 = add_title(service, "The Busy Executive's Database Guide", &[&a]).await;
    let t2 = add_title(service, "You Can Combat Computer Stress!", &[&a]).await;
    let t3 = add_title(service, "Straight Talk About Computers", &[&b, &a, &c]).await;

    let report = service.delete_author(&a).await.unwrap();
    let removed: HashSet<_> = report.removed_titles.into_iter().collect();
    assert_eq!(removed, HashSet::from([t1.clone(), t2.clone()]));

    for gone in [&t1, &t2] {
        assert!(matches!(
            service.get_title(gone).await.unwrap_err(),
            CatalogError::NotFound {
                entity: Entity::Title,
                ..
            }
        ));
    }
    assert!(service.get_author(&a).await.is_err());

    let survivor = service.get_title(&t3).await.unwrap();
    assert_eq!(author_ids(&survivor), vec![b, c]);
    assert_eq!(orders(&survivor), vec![1, 3]);
}

async fn check_delete_author_without_titles(service: &CatalogService) {
    let a = add_author(service, "Dirk", "Stringer").await;
    let report = service.delete_author(&a).await.unwrap();
    assert!(report.removed_titles.is_empty());
    assert!(service.get_author(&a).await.is_err());
}

async fn check_concurrent_author_deletion(service: &CatalogService) {
    let a = add_author(service, "Charlene", "Locksley").await;
    let t = add_title(service, "Emotional Security", &[&a]).await;

    let (first, second) = tokio::join!(service.delete_author(&a), service.delete_author(&a));
    let results = [first, second];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(CatalogError::NotFound {
            entity: Entity::Author,
            ..
        })
    )));
    assert!(service.get_title(&t).await.is_err());
}

async fn check_delete_title(service: &CatalogService) {
    let a = add_author(service, "Meander", "Smith").await;
    let t = add_title(service, "Silicon Valley Gastronomic Treats", &[&a]).await;

    service.delete_title(&t).await.unwrap();
    assert!(service.list_titles_by_author(&a).await.unwrap().is_empty());
    assert!(service.get_author(&a).await.is_ok());

    let err = service.delete_title(&t).await.unwrap_err();
    assert!(matches!(
        err,
        CatalogError::NotFound {
            entity: Entity::Title,
            ..
        }
    ));
}

async fn check_list_views_are_ordered(service: &CatalogService) {
    let a = add_author(service, "Burt", "Gringlesby").await;
    let b = add_author(service, "Anne", "Ringer").await;
    let created: HashSet<TitleId> = HashSet::from([
        add_title(service, "Sushi, Anyone?", &[&a, &b]).await,
        add_title(service, "Life Without Fear", &[&b]).await,
        add_title(service, "Prolonged Data Deprivation", &[&a]).await,
    ]);

    let listed: Vec<TitleId> = service
        .list_titles_with_authors()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title.title_id)
        .filter(|id| created.contains(id))
        .collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed, sorted);

    let by_b: Vec<TitleId> = service
        .list_titles_by_author(&b)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.title_id)
        .collect();
    let mut sorted = by_b.clone();
    sorted.sort();
    assert_eq!(by_b.len(), 2);
    assert_eq!(by_b, sorted);
}

// =============================================================================
// Suites
// =============================================================================

macro_rules! backend_suite {
    ($suite:ident, $backend:expr $(, #[$attr:meta])?) => {
        mod $suite {
            use super::*;

            async fn service() -> Option<CatalogService> {
                let Some(backend) = $backend else {
                    eprintln!("{}: connection URL not set, skipping", stringify!($suite));
                    return None;
                };
                let store = backend
                    .connect()
                    .await
                    .unwrap_or_else(|e| panic!("cannot reach {} backend: {}", backend.kind_str(), e));
                Some(CatalogService::new(store, &CatalogConfig::default()))
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_create_title_orders() {
                if let Some(service) = service().await {
                    check_create_title_orders(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_values_are_stored_as_given() {
                if let Some(service) = service().await {
                    check_values_are_stored_as_given(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_unknown_author_writes_nothing() {
                if let Some(service) = service().await {
                    check_unknown_author_writes_nothing(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_replace_author_list() {
                if let Some(service) = service().await {
                    check_replace_author_list(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_field_update_keeps_links() {
                if let Some(service) = service().await {
                    check_field_update_keeps_links(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_delete_author_cascade() {
                if let Some(service) = service().await {
                    check_delete_author_cascade(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_delete_author_without_titles() {
                if let Some(service) = service().await {
                    check_delete_author_without_titles(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_concurrent_author_deletion() {
                if let Some(service) = service().await {
                    check_concurrent_author_deletion(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_delete_title() {
                if let Some(service) = service().await {
                    check_delete_title(&service).await;
                }
            }

            #[tokio::test]
            $(#[$attr])?
            async fn test_list_views_are_ordered() {
                if let Some(service) = service().await {
                    check_list_views_are_ordered(&service).await;
                }
            }
        }
    };
}

backend_suite!(memory, TestBackend::memory());
backend_suite!(relational, TestBackend::relational_from_env(), #[ignore]);
backend_suite!(document, TestBackend::document_from_env(), #[ignore]);
