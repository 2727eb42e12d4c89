//! API handlers for the Bookshelf REST endpoints

pub mod authors;
pub mod health;
pub mod openapi;
pub mod titles;

use axum::{
    routing::get,
    Router,
};

use crate::AppState;

/// Catalog routes, to be nested under `/api`
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Authors
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:au_id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Titles
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/:title_id",
            get(titles::get_title)
                .put(titles::update_title)
                .delete(titles::delete_title),
        )
        .route("/titles/by-author/:au_id", get(authors::list_titles_by_author))
        .with_state(state)
}
