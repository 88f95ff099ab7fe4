// src/handlers/leases.rs

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
    middleware::user::RequestUser,
    models::lease::{CreateLeasePayload, LeaseFilter, LeaseSnapshot, UpdateLeasePayload},
};

// POST /api/leases
#[utoipa::path(
    post,
    path = "/api/leases",
    tag = "Empréstimos",
    request_body = CreateLeasePayload,
    responses(
        (status = 201, description = "Empréstimo criado e estoque reservado", body = LeaseSnapshot),
        (status = 400, description = "Lista de itens vazia"),
        (status = 404, description = "Usuário ou item não encontrado"),
        (status = 409, description = "Estoque insuficiente ou quantidade inválida")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "Usuário que está retirando os itens")
    )
)]
pub async fn create_lease(
    State(app_state): State<AppState>,
    user: RequestUser,
    Json(payload): Json<CreateLeasePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let lease = app_state
        .lease_service
        .create_lease(user.0, &payload.items)
        .await?;

    Ok((StatusCode::CREATED, Json(lease)))
}

// GET /api/leases
#[utoipa::path(
    get,
    path = "/api/leases",
    tag = "Empréstimos",
    params(
        ("userId" = Option<Uuid>, Query, description = "Filtra pelo usuário"),
        ("returned" = Option<bool>, Query, description = "true = fechados, false = abertos"),
        ("from" = Option<String>, Query, description = "Criados a partir de (RFC 3339)"),
        ("to" = Option<String>, Query, description = "Criados antes de (RFC 3339)"),
        ("limit" = Option<i64>, Query, description = "Máximo de resultados")
    ),
    responses(
        (status = 200, description = "Empréstimos, do mais recente ao mais antigo", body = Vec<LeaseSnapshot>)
    )
)]
pub async fn list_leases(
    State(app_state): State<AppState>,
    Query(filter): Query<LeaseFilter>,
) -> Result<impl IntoResponse, AppError> {
    let leases = app_state.lease_service.list_leases(&filter).await?;
    Ok((StatusCode::OK, Json(leases)))
}

// GET /api/leases/{id}
#[utoipa::path(
    get,
    path = "/api/leases/{id}",
    tag = "Empréstimos",
    params(("id" = Uuid, Path, description = "ID do empréstimo")),
    responses(
        (status = 200, description = "Empréstimo", body = LeaseSnapshot),
        (status = 404, description = "Empréstimo não encontrado")
    )
)]
pub async fn get_lease(
    State(app_state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lease = app_state.lease_service.get_lease(lease_id).await?;
    Ok((StatusCode::OK, Json(lease)))
}

// PUT /api/leases/{id}
#[utoipa::path(
    put,
    path = "/api/leases/{id}",
    tag = "Empréstimos",
    request_body = UpdateLeasePayload,
    params(("id" = Uuid, Path, description = "ID do empréstimo")),
    responses(
        (status = 200, description = "Itens do empréstimo substituídos", body = LeaseSnapshot),
        (status = 404, description = "Empréstimo ou item não encontrado"),
        (status = 409, description = "Empréstimo fechado ou estoque insuficiente")
    )
)]
pub async fn update_lease(
    State(app_state): State<AppState>,
    Path(lease_id): Path<Uuid>,
    Json(payload): Json<UpdateLeasePayload>,
) -> Result<impl IntoResponse, AppError> {
    let lease = app_state
        .lease_service
        .update_lease(lease_id, &payload.items)
        .await?;
    Ok((StatusCode::OK, Json(lease)))
}

// POST /api/leases/{id}/close
#[utoipa::path(
    post,
    path = "/api/leases/{id}/close",
    tag = "Empréstimos",
    params(("id" = Uuid, Path, description = "ID do empréstimo")),
    responses(
        (status = 200, description = "Empréstimo fechado (itens devolvidos)", body = LeaseSnapshot),
        (status = 404, description = "Empréstimo não encontrado"),
        (status = 409, description = "Empréstimo já fechado")
    )
)]
pub async fn close_lease(
    State(app_state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lease = app_state.lease_service.close_lease(lease_id).await?;
    Ok((StatusCode::OK, Json(lease)))
}

// POST /api/leases/{id}/reopen
#[utoipa::path(
    post,
    path = "/api/leases/{id}/reopen",
    tag = "Empréstimos",
    params(("id" = Uuid, Path, description = "ID do empréstimo")),
    responses(
        (status = 200, description = "Empréstimo reaberto", body = LeaseSnapshot),
        (status = 404, description = "Empréstimo não encontrado"),
        (status = 409, description = "Empréstimo já aberto")
    )
)]
pub async fn reopen_lease(
    State(app_state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lease = app_state.lease_service.reopen_lease(lease_id).await?;
    Ok((StatusCode::OK, Json(lease)))
}

// DELETE /api/leases/{id}
#[utoipa::path(
    delete,
    path = "/api/leases/{id}",
    tag = "Empréstimos",
    params(("id" = Uuid, Path, description = "ID do empréstimo")),
    responses(
        (status = 204, description = "Empréstimo removido e estoque devolvido"),
        (status = 404, description = "Empréstimo não encontrado"),
        (status = 409, description = "Empréstimo ainda aberto")
    )
)]
pub async fn delete_lease(
    State(app_state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.lease_service.delete_lease(lease_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
