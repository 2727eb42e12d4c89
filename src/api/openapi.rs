//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, health, titles};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookshelf API",
        version = "1.0.0",
        description = "Authors and titles catalog REST API"
    ),
    servers(
        (url = "/api", description = "Catalog API")
    ),
    paths(
        // Health
        health::health_check,
        // Authors
        authors::list_authors,
        authors::create_author,
        authors::get_author,
        authors::update_author,
        authors::delete_author,
        authors::list_titles_by_author,
        // Titles
        titles::list_titles,
        titles::create_title,
        titles::get_title,
        titles::update_title,
        titles::delete_title,
    ),
    components(
        schemas(
            // Authors
            crate::models::Author,
            crate::models::CreateAuthor,
            crate::models::AuthorPatch,
            crate::models::AuthorTitle,
            crate::services::DeletionReport,
            // Titles
            crate::models::Title,
            crate::models::NewTitle,
            crate::models::CreateTitle,
            crate::models::TitlePatch,
            crate::models::UpdateTitle,
            crate::models::TitleAuthor,
            crate::models::TitleWithAuthors,
            crate::models::RelationInput,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "authors", description = "Author management"),
        (name = "titles", description = "Title management and author links")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
