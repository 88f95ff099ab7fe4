//src/main.rs

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;

fn build_router(app_state: AppState) -> Router {
    let lease_routes = Router::new()
        .route("/"
               ,post(handlers::leases::create_lease)
               .get(handlers::leases::list_leases)
        )
        .route("/{id}"
               ,get(handlers::leases::get_lease)
               .put(handlers::leases::update_lease)
               .delete(handlers::leases::delete_lease)
        )
        .route("/{id}/close", post(handlers::leases::close_lease))
        .route("/{id}/reopen", post(handlers::leases::reopen_lease));

    let item_routes = Router::new()
        .route("/"
               ,post(handlers::items::create_item)
               .get(handlers::items::list_items)
        )
        .route("/{id}"
               ,get(handlers::items::get_item)
               .put(handlers::items::update_item)
               .patch(handlers::items::patch_item)
               .delete(handlers::items::delete_item)
        )
        .route("/{id}/stock", patch(handlers::items::adjust_stock));

    let category_routes = Router::new()
        .route("/"
               ,post(handlers::categories::create_category)
               .get(handlers::categories::list_categories)
        )
        .route("/{id}"
               ,put(handlers::categories::update_category)
               .patch(handlers::categories::patch_category)
               .delete(handlers::categories::delete_category)
        );

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/dashboard", get(handlers::dashboard::get_dashboard))
        .route("/armory", get(handlers::realtime::armory_socket))
        .nest("/api/leases", lease_routes)
        .nest("/api/items", item_routes)
        .nest("/api/categories", category_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG manda; sem ele, "info".
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config).await?;

    let app = build_router(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
