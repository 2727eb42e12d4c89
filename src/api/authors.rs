//! Authors API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::CatalogResult,
    ids::AuthorId,
    models::{Author, AuthorPatch, AuthorTitle, CreateAuthor},
    services::DeletionReport,
    AppState,
};

/// List all authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "authors",
    responses(
        (status = 200, description = "Authors ordered by id", body = Vec<Author>)
    )
)]
pub async fn list_authors(State(state): State<AppState>) -> CatalogResult<Json<Vec<Author>>> {
    let authors = state.services.catalog.list_authors().await?;
    Ok(Json(authors))
}

/// Create an author
#[utoipa::path(
    post,
    path = "/authors",
    tag = "authors",
    request_body = CreateAuthor,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 400, description = "Invalid author", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_author(
    State(state): State<AppState>,
    Json(data): Json<CreateAuthor>,
) -> CatalogResult<(StatusCode, Json<Author>)> {
    let au_id = state.services.catalog.create_author(data).await?;
    let author = state.services.catalog.get_author(&au_id).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// Get author by id
#[utoipa::path(
    get,
    path = "/authors/{au_id}",
    tag = "authors",
    params(("au_id" = String, Path, description = "Author ID (DDD-DD-DDDD)")),
    responses(
        (status = 200, description = "Author details", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_author(
    State(state): State<AppState>,
    Path(au_id): Path<String>,
) -> CatalogResult<Json<Author>> {
    let au_id = AuthorId::parse(&au_id)?;
    let author = state.services.catalog.get_author(&au_id).await?;
    Ok(Json(author))
}

/// Update an author (only supplied fields change)
#[utoipa::path(
    put,
    path = "/authors/{au_id}",
    tag = "authors",
    params(("au_id" = String, Path, description = "Author ID (DDD-DD-DDDD)")),
    request_body = AuthorPatch,
    responses(
        (status = 200, description = "Author updated", body = Author),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_author(
    State(state): State<AppState>,
    Path(au_id): Path<String>,
    Json(patch): Json<AuthorPatch>,
) -> CatalogResult<Json<Author>> {
    let au_id = AuthorId::parse(&au_id)?;
    state.services.catalog.update_author(&au_id, patch).await?;
    let author = state.services.catalog.get_author(&au_id).await?;
    Ok(Json(author))
}

/// Delete an author, cascading to titles it was the only author of
#[utoipa::path(
    delete,
    path = "/authors/{au_id}",
    tag = "authors",
    params(("au_id" = String, Path, description = "Author ID (DDD-DD-DDDD)")),
    responses(
        (status = 200, description = "Author deleted", body = DeletionReport),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<AppState>,
    Path(au_id): Path<String>,
) -> CatalogResult<Json<DeletionReport>> {
    let au_id = AuthorId::parse(&au_id)?;
    let report = state.services.catalog.delete_author(&au_id).await?;
    Ok(Json(report))
}

/// Titles an author contributes to
#[utoipa::path(
    get,
    path = "/titles/by-author/{au_id}",
    tag = "titles",
    params(("au_id" = String, Path, description = "Author ID (DDD-DD-DDDD)")),
    responses(
        (status = 200, description = "Titles of the author", body = Vec<AuthorTitle>),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_titles_by_author(
    State(state): State<AppState>,
    Path(au_id): Path<String>,
) -> CatalogResult<Json<Vec<AuthorTitle>>> {
    let au_id = AuthorId::parse(&au_id)?;
    let titles = state.services.catalog.list_titles_by_author(&au_id).await?;
    Ok(Json(titles))
}
