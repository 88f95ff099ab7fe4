// src/handlers/categories.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::inventory::{
        Category, CreateCategoryPayload, PatchCategoryPayload, UpdateCategoryPayload,
    },
};

// POST /api/categories
#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "Arsenal",
    request_body = CreateCategoryPayload,
    responses(
        (status = 201, description = "Categoria criada", body = Category),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Nome já cadastrado")
    )
)]
pub async fn create_category(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let category = app_state.catalog_service.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

// GET /api/categories
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Arsenal",
    responses(
        (status = 200, description = "Categorias", body = Vec<Category>)
    )
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let categories = app_state.catalog_service.list_categories().await?;
    Ok((StatusCode::OK, Json(categories)))
}

// PUT /api/categories/{id}
#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "Arsenal",
    request_body = UpdateCategoryPayload,
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria atualizada", body = Category),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Nome já cadastrado ou categoria Default")
    )
)]
pub async fn update_category(
    State(app_state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let category = app_state
        .catalog_service
        .update_category(category_id, payload)
        .await?;
    Ok((StatusCode::OK, Json(category)))
}

// PATCH /api/categories/{id}
#[utoipa::path(
    patch,
    path = "/api/categories/{id}",
    tag = "Arsenal",
    request_body = PatchCategoryPayload,
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria atualizada", body = Category),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Nome já cadastrado ou categoria Default")
    )
)]
pub async fn patch_category(
    State(app_state): State<AppState>,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<PatchCategoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let category = app_state
        .catalog_service
        .patch_category(category_id, payload)
        .await?;
    Ok((StatusCode::OK, Json(category)))
}

// DELETE /api/categories/{id}
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "Arsenal",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 204, description = "Categoria removida; itens movidos para Default"),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Categoria Default ou com itens emprestados")
    )
)]
pub async fn delete_category(
    State(app_state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.catalog_service.delete_category(category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
