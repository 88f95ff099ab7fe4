// src/handlers/dashboard.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{common::error::AppError, config::AppState, models::dashboard::DashboardSnapshot};

// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Últimos empréstimos, itens recentes e totais do dia", body = DashboardSnapshot)
    )
)]
pub async fn get_dashboard(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = app_state.dashboard_service.get_snapshot().await?;
    Ok((StatusCode::OK, Json(snapshot)))
}
