// src/db/pg_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{Repository, RepositoryTx},
    models::{
        inventory::{Category, Item, ItemDetails, ItemFilter, NewItem},
        lease::{Lease, LeaseFilter, LeaseLineItem},
        user::UserSummary,
    },
};

// Converte violação de chave única em DuplicateName, o resto vira DatabaseError.
fn map_unique_violation(e: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::DuplicateName(name.to_string());
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgRepositoryTx { tx }))
    }
}

// Se for descartada sem commit, o sqlx faz o ROLLBACK.
pub struct PgRepositoryTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RepositoryTx for PgRepositoryTx {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<UserSummary>, AppError> {
        let user = sqlx::query_as::<_, UserSummary>(
            "SELECT id, first_name, last_name, email, image_key, is_admin FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    // ---
    // Categorias
    // ---

    async fn find_category(&mut self, category_id: Uuid) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(category)
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>, AppError> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(category)
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name ASC")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(categories)
    }

    async fn insert_category(&mut self, name: &str, image_key: Option<&str>) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, image_key)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(image_key)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, name))
    }

    async fn update_category(&mut self, category_id: Uuid, name: &str, image_key: Option<&str>) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET name = $2, image_key = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(category_id)
        .bind(name)
        .bind(image_key)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, name))?
        .ok_or(AppError::CategoryNotFound)
    }

    async fn delete_category(&mut self, category_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn reassign_items(&mut self, from: Uuid, to: Uuid) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET category_id = $2, updated_at = now()
            WHERE category_id = $1
            RETURNING *
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    // ---
    // Itens
    // ---

    async fn find_item(&mut self, item_id: Uuid) -> Result<Option<Item>, AppError> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(item)
    }

    async fn lock_items(&mut self, item_ids: &[Uuid]) -> Result<Vec<Item>, AppError> {
        // Ordem fixa de bloqueio: duas transações nunca se travam mutuamente.
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(item_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn list_items(&mut self, filter: &ItemFilter) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::uuid IS NULL OR category_id = $2)
            ORDER BY name ASC
            "#,
        )
        .bind(filter.name.as_deref())
        .bind(filter.category_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn recent_items(&mut self, limit: i64) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(items)
    }

    async fn insert_item(&mut self, item: &NewItem) -> Result<Item, AppError> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, category_id, description, image_key, available_quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&item.name)
        .bind(item.category_id)
        .bind(&item.description)
        .bind(item.image_key.as_deref())
        .bind(item.available_quantity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, &item.name))
    }

    async fn update_item_details(&mut self, item_id: Uuid, details: &ItemDetails) -> Result<Item, AppError> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = $2, category_id = $3, description = $4, image_key = $5, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(&details.name)
        .bind(details.category_id)
        .bind(&details.description)
        .bind(details.image_key.as_deref())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_unique_violation(e, &details.name))?
        .ok_or(AppError::ItemNotFound)
    }

    async fn set_available_quantity(&mut self, item_id: Uuid, quantity: i64) -> Result<Item, AppError> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET available_quantity = $2, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::ItemNotFound)
    }

    async fn delete_item(&mut self, item_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn total_available(&mut self) -> Result<i64, AppError> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(available_quantity), 0)::BIGINT FROM items",
        )
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total)
    }

    // ---
    // Empréstimos
    // ---

    async fn insert_lease(&mut self, user_id: Uuid) -> Result<Lease, AppError> {
        let lease = sqlx::query_as::<_, Lease>(
            "INSERT INTO leases (user_id, returned) VALUES ($1, FALSE) RETURNING *",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(lease)
    }

    async fn lock_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError> {
        let lease = sqlx::query_as::<_, Lease>(
            "SELECT * FROM leases WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(lease_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(lease)
    }

    async fn find_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError> {
        let lease = sqlx::query_as::<_, Lease>(
            "SELECT * FROM leases WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(lease_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(lease)
    }

    async fn list_leases(&mut self, filter: &LeaseFilter) -> Result<Vec<Lease>, AppError> {
        // LIMIT NULL equivale a LIMIT ALL no Postgres.
        let leases = sqlx::query_as::<_, Lease>(
            r#"
            SELECT * FROM leases
            WHERE deleted_at IS NULL
              AND ($1::uuid IS NULL OR user_id = $1)
              AND ($2::bool IS NULL OR returned = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ORDER BY created_at DESC
            LIMIT $5
            "#,
        )
        .bind(filter.user_id)
        .bind(filter.returned)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.limit)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(leases)
    }

    async fn set_lease_returned(&mut self, lease_id: Uuid, returned: bool) -> Result<Lease, AppError> {
        sqlx::query_as::<_, Lease>(
            r#"
            UPDATE leases SET returned = $2, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(lease_id)
        .bind(returned)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::LeaseNotFound)
    }

    async fn touch_lease(&mut self, lease_id: Uuid) -> Result<Lease, AppError> {
        sqlx::query_as::<_, Lease>(
            "UPDATE leases SET updated_at = now() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(lease_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::LeaseNotFound)
    }

    async fn soft_delete_lease(&mut self, lease_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE leases SET deleted_at = now(), updated_at = now() WHERE id = $1")
            .bind(lease_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn count_leases_since(&mut self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM leases WHERE deleted_at IS NULL AND created_at >= $1",
        )
        .bind(since)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    // ---
    // Linhas de empréstimo
    // ---

    async fn lease_lines(&mut self, lease_id: Uuid) -> Result<Vec<LeaseLineItem>, AppError> {
        let lines = sqlx::query_as::<_, LeaseLineItem>(
            "SELECT lease_id, item_id, quantity FROM lease_items WHERE lease_id = $1 ORDER BY item_id",
        )
        .bind(lease_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(lines)
    }

    async fn insert_lease_line(&mut self, lease_id: Uuid, item_id: Uuid, quantity: i64) -> Result<LeaseLineItem, AppError> {
        let line = sqlx::query_as::<_, LeaseLineItem>(
            r#"
            INSERT INTO lease_items (lease_id, item_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING lease_id, item_id, quantity
            "#,
        )
        .bind(lease_id)
        .bind(item_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(line)
    }

    async fn delete_lease_lines(&mut self, lease_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM lease_items WHERE lease_id = $1")
            .bind(lease_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn open_reservations_for_item(&mut self, item_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM lease_items li
            JOIN leases l ON l.id = li.lease_id
            WHERE li.item_id = $1 AND l.returned = FALSE AND l.deleted_at IS NULL
            "#,
        )
        .bind(item_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn open_reservations_for_category(&mut self, category_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM lease_items li
            JOIN leases l ON l.id = li.lease_id
            JOIN items i ON i.id = li.item_id
            WHERE i.category_id = $1 AND l.returned = FALSE AND l.deleted_at IS NULL
            "#,
        )
        .bind(category_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
