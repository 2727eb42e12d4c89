//! Titles API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::CatalogResult,
    ids::TitleId,
    models::{CreateTitle, TitleWithAuthors, UpdateTitle},
    AppState,
};

/// List all titles with their authors
#[utoipa::path(
    get,
    path = "/titles",
    tag = "titles",
    responses(
        (status = 200, description = "Titles ordered by id", body = Vec<TitleWithAuthors>)
    )
)]
pub async fn list_titles(
    State(state): State<AppState>,
) -> CatalogResult<Json<Vec<TitleWithAuthors>>> {
    let titles = state.services.catalog.list_titles_with_authors().await?;
    Ok(Json(titles))
}

/// Create a title linked to existing authors
#[utoipa::path(
    post,
    path = "/titles",
    tag = "titles",
    request_body = CreateTitle,
    responses(
        (status = 201, description = "Title created", body = TitleWithAuthors),
        (status = 400, description = "Invalid title or author list", body = crate::error::ErrorResponse),
        (status = 404, description = "Referenced author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_title(
    State(state): State<AppState>,
    Json(data): Json<CreateTitle>,
) -> CatalogResult<(StatusCode, Json<TitleWithAuthors>)> {
    let title_id = state.services.catalog.create_title(data).await?;
    let title = state.services.catalog.get_title(&title_id).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// Get title by id
#[utoipa::path(
    get,
    path = "/titles/{title_id}",
    tag = "titles",
    params(("title_id" = String, Path, description = "Title ID (LLDDDD)")),
    responses(
        (status = 200, description = "Title details", body = TitleWithAuthors),
        (status = 404, description = "Title not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
) -> CatalogResult<Json<TitleWithAuthors>> {
    let title_id = TitleId::parse(&title_id)?;
    let title = state.services.catalog.get_title(&title_id).await?;
    Ok(Json(title))
}

/// Update a title; `authors`, when present, replaces the whole author list
#[utoipa::path(
    put,
    path = "/titles/{title_id}",
    tag = "titles",
    params(("title_id" = String, Path, description = "Title ID (LLDDDD)")),
    request_body = UpdateTitle,
    responses(
        (status = 200, description = "Title updated", body = TitleWithAuthors),
        (status = 400, description = "Invalid fields or empty author list", body = crate::error::ErrorResponse),
        (status = 404, description = "Title or author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_title(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
    Json(data): Json<UpdateTitle>,
) -> CatalogResult<Json<TitleWithAuthors>> {
    let title_id = TitleId::parse(&title_id)?;
    state.services.catalog.update_title(&title_id, data).await?;
    let title = state.services.catalog.get_title(&title_id).await?;
    Ok(Json(title))
}

/// Delete a title and its author links
#[utoipa::path(
    delete,
    path = "/titles/{title_id}",
    tag = "titles",
    params(("title_id" = String, Path, description = "Title ID (LLDDDD)")),
    responses(
        (status = 204, description = "Title deleted"),
        (status = 404, description = "Title not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_title(
    State(state): State<AppState>,
    Path(title_id): Path<String>,
) -> CatalogResult<StatusCode> {
    let title_id = TitleId::parse(&title_id)?;
    state.services.catalog.delete_title(&title_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
