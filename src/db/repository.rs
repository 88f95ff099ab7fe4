// src/db/repository.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        inventory::{Category, Item, ItemDetails, ItemFilter, NewItem},
        lease::{Lease, LeaseFilter, LeaseLineItem},
        user::UserSummary,
    },
};

/// Fronteira de persistência. Todo caso de uso abre exatamente uma transação
/// com `begin()` e termina com `commit()`; uma transação descartada sem commit
/// é desfeita por completo.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, AppError>;
}

/// Operações disponíveis dentro de uma transação.
///
/// Os métodos `lock_*` bloqueiam a linha até o fim da transação
/// (`SELECT ... FOR UPDATE` no Postgres), e é depois deles que o estoque pode
/// ser conferido e gravado.
#[async_trait]
pub trait RepositoryTx: Send {
    // ---
    // Usuários (somente leitura)
    // ---
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<UserSummary>, AppError>;

    // ---
    // Categorias
    // ---
    async fn find_category(&mut self, category_id: Uuid) -> Result<Option<Category>, AppError>;
    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>, AppError>;
    async fn list_categories(&mut self) -> Result<Vec<Category>, AppError>;
    async fn insert_category(&mut self, name: &str, image_key: Option<&str>) -> Result<Category, AppError>;
    async fn update_category(&mut self, category_id: Uuid, name: &str, image_key: Option<&str>) -> Result<Category, AppError>;
    async fn delete_category(&mut self, category_id: Uuid) -> Result<(), AppError>;
    /// Move todos os itens de `from` para `to`. Devolve os itens movidos.
    async fn reassign_items(&mut self, from: Uuid, to: Uuid) -> Result<Vec<Item>, AppError>;

    // ---
    // Itens
    // ---
    async fn find_item(&mut self, item_id: Uuid) -> Result<Option<Item>, AppError>;
    /// Bloqueia os itens em ordem crescente de id. Itens inexistentes são ignorados.
    async fn lock_items(&mut self, item_ids: &[Uuid]) -> Result<Vec<Item>, AppError>;
    async fn list_items(&mut self, filter: &ItemFilter) -> Result<Vec<Item>, AppError>;
    async fn recent_items(&mut self, limit: i64) -> Result<Vec<Item>, AppError>;
    async fn insert_item(&mut self, item: &NewItem) -> Result<Item, AppError>;
    /// Grava nome, categoria, descrição e imagem. Não mexe no estoque.
    async fn update_item_details(&mut self, item_id: Uuid, details: &ItemDetails) -> Result<Item, AppError>;
    async fn set_available_quantity(&mut self, item_id: Uuid, quantity: i64) -> Result<Item, AppError>;
    async fn delete_item(&mut self, item_id: Uuid) -> Result<(), AppError>;
    /// Soma do estoque disponível de todos os itens.
    async fn total_available(&mut self) -> Result<i64, AppError>;

    // ---
    // Empréstimos
    // ---
    async fn insert_lease(&mut self, user_id: Uuid) -> Result<Lease, AppError>;
    async fn lock_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError>;
    async fn find_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError>;
    async fn list_leases(&mut self, filter: &LeaseFilter) -> Result<Vec<Lease>, AppError>;
    async fn set_lease_returned(&mut self, lease_id: Uuid, returned: bool) -> Result<Lease, AppError>;
    /// Só atualiza o `updated_at` (os itens do empréstimo mudaram).
    async fn touch_lease(&mut self, lease_id: Uuid) -> Result<Lease, AppError>;
    /// Remoção lógica (`deleted_at`); o empréstimo some de todas as consultas.
    async fn soft_delete_lease(&mut self, lease_id: Uuid) -> Result<(), AppError>;
    async fn count_leases_since(&mut self, since: DateTime<Utc>) -> Result<i64, AppError>;

    // ---
    // Linhas de empréstimo
    // ---
    async fn lease_lines(&mut self, lease_id: Uuid) -> Result<Vec<LeaseLineItem>, AppError>;
    async fn insert_lease_line(&mut self, lease_id: Uuid, item_id: Uuid, quantity: i64) -> Result<LeaseLineItem, AppError>;
    async fn delete_lease_lines(&mut self, lease_id: Uuid) -> Result<u64, AppError>;
    /// Quantas linhas de empréstimos abertos referenciam o item.
    async fn open_reservations_for_item(&mut self, item_id: Uuid) -> Result<i64, AppError>;
    /// Quantas linhas de empréstimos abertos referenciam itens da categoria.
    async fn open_reservations_for_category(&mut self, category_id: Uuid) -> Result<i64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;
}
