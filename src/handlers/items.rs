// src/handlers/items.rs

use axum::{
    extract::{Path, Query, State},
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
        AdjustStockPayload, CreateItemPayload, ItemFilter, ItemSnapshot, PatchItemPayload,
        UpdateItemPayload,
    },
};

// POST /api/items
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "Arsenal",
    request_body = CreateItemPayload,
    responses(
        (status = 201, description = "Item cadastrado", body = ItemSnapshot),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Categoria não encontrada"),
        (status = 409, description = "Nome já cadastrado")
    )
)]
pub async fn create_item(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state.catalog_service.create_item(payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// GET /api/items
#[utoipa::path(
    get,
    path = "/api/items",
    tag = "Arsenal",
    params(
        ("name" = Option<String>, Query, description = "Busca parcial pelo nome"),
        ("categoryId" = Option<Uuid>, Query, description = "Filtra pela categoria")
    ),
    responses(
        (status = 200, description = "Itens do arsenal", body = Vec<ItemSnapshot>)
    )
)]
pub async fn list_items(
    State(app_state): State<AppState>,
    Query(filter): Query<ItemFilter>,
) -> Result<impl IntoResponse, AppError> {
    let items = app_state.catalog_service.list_items(&filter).await?;
    Ok((StatusCode::OK, Json(items)))
}

// GET /api/items/{id}
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    tag = "Arsenal",
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Item", body = ItemSnapshot),
        (status = 404, description = "Item não encontrado")
    )
)]
pub async fn get_item(
    State(app_state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state.catalog_service.get_item(item_id).await?;
    Ok((StatusCode::OK, Json(item)))
}

// PUT /api/items/{id}
#[utoipa::path(
    put,
    path = "/api/items/{id}",
    tag = "Arsenal",
    request_body = UpdateItemPayload,
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Item atualizado", body = ItemSnapshot),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Item ou categoria não encontrados"),
        (status = 409, description = "Nome já cadastrado")
    )
)]
pub async fn update_item(
    State(app_state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state.catalog_service.update_item(item_id, payload).await?;
    Ok((StatusCode::OK, Json(item)))
}

// PATCH /api/items/{id}
#[utoipa::path(
    patch,
    path = "/api/items/{id}",
    tag = "Arsenal",
    request_body = PatchItemPayload,
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Item atualizado", body = ItemSnapshot),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Item ou categoria não encontrados"),
        (status = 409, description = "Nome já cadastrado")
    )
)]
pub async fn patch_item(
    State(app_state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<PatchItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state.catalog_service.patch_item(item_id, payload).await?;
    Ok((StatusCode::OK, Json(item)))
}

// DELETE /api/items/{id}
#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    tag = "Arsenal",
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 204, description = "Item removido"),
        (status = 404, description = "Item não encontrado"),
        (status = 409, description = "Item reservado por um empréstimo aberto")
    )
)]
pub async fn delete_item(
    State(app_state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.catalog_service.delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/items/{id}/stock
#[utoipa::path(
    patch,
    path = "/api/items/{id}/stock",
    tag = "Arsenal",
    request_body = AdjustStockPayload,
    params(("id" = Uuid, Path, description = "ID do item")),
    responses(
        (status = 200, description = "Estoque ajustado", body = ItemSnapshot),
        (status = 404, description = "Item não encontrado"),
        (status = 409, description = "O estoque ficaria negativo")
    )
)]
pub async fn adjust_stock(
    State(app_state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AdjustStockPayload>,
) -> Result<impl IntoResponse, AppError> {
    let item = app_state
        .catalog_service
        .adjust_stock(item_id, payload.delta)
        .await?;
    Ok((StatusCode::OK, Json(item)))
}
