// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    db::{MemoryRepository, PgRepository, Repository},
    services::{
        catalog_service::CatalogService, change_notifier::ChangeNotifier,
        dashboard_service::DashboardService, lease_service::LeaseService,
        stock_ledger::StockLedger,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Postgres,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StorageKind::Postgres),
            "memory" | "mem" => Ok(StorageKind::Memory),
            other => anyhow::bail!("STORAGE inválido: '{other}' (use 'postgres' ou 'memory')"),
        }
    }
}

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageKind,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub notifier_buffer: usize,
    pub dashboard_latest: i64,
}

// Lê a variável e converte; ausente => default.
fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} inválido ('{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let storage = var_or("STORAGE", StorageKind::Postgres)?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageKind::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL deve ser definida (ou use STORAGE=memory)");
        }

        Ok(Self {
            storage,
            database_url,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", 5)?,
            notifier_buffer: var_or("NOTIFIER_BUFFER", 64)?,
            dashboard_latest: var_or("DASHBOARD_LATEST", 5)?,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub notifier: ChangeNotifier,
    pub lease_service: LeaseService,
    pub catalog_service: CatalogService,
    pub dashboard_service: DashboardService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let repo: Arc<dyn Repository> = match config.storage {
            StorageKind::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL deve ser definida")?;

                let db_pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!().run(&db_pool).await?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Arc::new(PgRepository::new(db_pool))
            }
            StorageKind::Memory => {
                let repo = MemoryRepository::new();
                let demo = repo.seed_demo().await?;
                tracing::warn!(user_id = %demo.id, "⚠️ Armazenamento em memória: os dados somem ao reiniciar");
                Arc::new(repo)
            }
        };

        Ok(Self::with_repository(repo, config))
    }

    // --- Monta o gráfico de dependências ---
    pub fn with_repository(repo: Arc<dyn Repository>, config: &AppConfig) -> Self {
        let notifier = ChangeNotifier::new(config.notifier_buffer);
        let ledger = StockLedger::new();

        Self {
            lease_service: LeaseService::new(repo.clone(), ledger, notifier.clone()),
            catalog_service: CatalogService::new(repo.clone(), ledger, notifier.clone()),
            dashboard_service: DashboardService::new(repo.clone(), config.dashboard_latest),
            repo,
            notifier,
        }
    }
}
