// src/db/memory_repo.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::repository::{Repository, RepositoryTx},
    models::{
        inventory::{Category, Item, ItemDetails, ItemFilter, NewItem, DEFAULT_CATEGORY_NAME},
        lease::{Lease, LeaseFilter, LeaseLineItem},
        user::UserSummary,
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, UserSummary>,
    categories: HashMap<Uuid, Category>,
    items: HashMap<Uuid, Item>,
    leases: HashMap<Uuid, Lease>,
    lines: BTreeMap<(Uuid, Uuid), LeaseLineItem>,
}

impl MemoryState {
    fn open_lease(&self, lease_id: Uuid) -> bool {
        self.leases
            .get(&lease_id)
            .map(|l| !l.returned && l.deleted_at.is_none())
            .unwrap_or(false)
    }

    // UNIQUE (name), ignorando o próprio item numa edição.
    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.items
            .values()
            .any(|i| i.name == name && Some(i.id) != except)
    }
}

/// Repositório em memória, para testes e para rodar sem Postgres
/// (`STORAGE=memory`).
///
/// Uma transação segura o lock global até o commit ou o drop, então as
/// transações são serializadas. As escritas acontecem numa cópia do estado,
/// que só substitui o original no commit.
#[derive(Clone)]
pub struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Cria o repositório já com a categoria "Default", como faz a migração.
    pub fn new() -> Self {
        let now = Utc::now();
        let default_category = Category {
            id: Uuid::new_v4(),
            name: DEFAULT_CATEGORY_NAME.to_string(),
            image_key: None,
            created_at: now,
            updated_at: now,
        };
        let mut state = MemoryState::default();
        state.categories.insert(default_category.id, default_category);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    // Usuários vêm do sistema de autenticação; aqui só semeamos.
    pub async fn insert_user(&self, user: UserSummary) {
        self.state.lock().await.users.insert(user.id, user);
    }

    /// Dados de demonstração para rodar localmente.
    pub async fn seed_demo(&self) -> Result<UserSummary, AppError> {
        let user = UserSummary {
            id: Uuid::new_v4(),
            first_name: "Demo".into(),
            last_name: "Admin".into(),
            email: "demo@armory.local".into(),
            image_key: None,
            is_admin: true,
        };
        self.insert_user(user.clone()).await;

        let mut tx = self.begin().await?;
        let default = tx
            .find_category_by_name(DEFAULT_CATEGORY_NAME)
            .await?
            .ok_or(AppError::CategoryNotFound)?;
        for (name, quantity) in [("Rope50m", 10), ("Carabiner", 10), ("Harness", 5)] {
            tx.insert_item(&NewItem {
                name: name.to_string(),
                category_id: default.id,
                description: String::new(),
                image_key: None,
                available_quantity: quantity,
            })
            .await?;
        }
        tx.commit().await?;
        Ok(user)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn begin(&self) -> Result<Box<dyn RepositoryTx>, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl RepositoryTx for MemoryTx {
    async fn find_user(&mut self, user_id: Uuid) -> Result<Option<UserSummary>, AppError> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    // ---
    // Categorias
    // ---

    async fn find_category(&mut self, category_id: Uuid) -> Result<Option<Category>, AppError> {
        Ok(self.working.categories.get(&category_id).cloned())
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>, AppError> {
        Ok(self.working.categories.values().find(|c| c.name == name).cloned())
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, AppError> {
        let mut categories: Vec<Category> = self.working.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(&mut self, name: &str, image_key: Option<&str>) -> Result<Category, AppError> {
        if self.working.categories.values().any(|c| c.name == name) {
            return Err(AppError::DuplicateName(name.to_string()));
        }
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            image_key: image_key.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.working.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&mut self, category_id: Uuid, name: &str, image_key: Option<&str>) -> Result<Category, AppError> {
        if self
            .working
            .categories
            .values()
            .any(|c| c.name == name && c.id != category_id)
        {
            return Err(AppError::DuplicateName(name.to_string()));
        }
        let category = self
            .working
            .categories
            .get_mut(&category_id)
            .ok_or(AppError::CategoryNotFound)?;
        category.name = name.to_string();
        category.image_key = image_key.map(str::to_string);
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&mut self, category_id: Uuid) -> Result<(), AppError> {
        if self.working.items.values().any(|i| i.category_id == category_id) {
            // Mesmo comportamento da chave estrangeira no Postgres.
            return Err(AppError::InternalServerError(anyhow!(
                "categoria {category_id} ainda possui itens"
            )));
        }
        self.working.categories.remove(&category_id);
        Ok(())
    }

    async fn reassign_items(&mut self, from: Uuid, to: Uuid) -> Result<Vec<Item>, AppError> {
        let now = Utc::now();
        let mut moved = Vec::new();
        for item in self.working.items.values_mut().filter(|i| i.category_id == from) {
            item.category_id = to;
            item.updated_at = now;
            moved.push(item.clone());
        }
        Ok(moved)
    }

    // ---
    // Itens
    // ---

    async fn find_item(&mut self, item_id: Uuid) -> Result<Option<Item>, AppError> {
        Ok(self.working.items.get(&item_id).cloned())
    }

    async fn lock_items(&mut self, item_ids: &[Uuid]) -> Result<Vec<Item>, AppError> {
        // O lock global já cobre a transação inteira.
        let mut items: Vec<Item> = item_ids
            .iter()
            .filter_map(|id| self.working.items.get(id).cloned())
            .collect();
        items.sort_by_key(|i| i.id);
        items.dedup_by_key(|i| i.id);
        Ok(items)
    }

    async fn list_items(&mut self, filter: &ItemFilter) -> Result<Vec<Item>, AppError> {
        let mut items: Vec<Item> = self
            .working
            .items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn recent_items(&mut self, limit: i64) -> Result<Vec<Item>, AppError> {
        let mut items: Vec<Item> = self.working.items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(items)
    }

    async fn insert_item(&mut self, item: &NewItem) -> Result<Item, AppError> {
        if self.working.name_taken(&item.name, None) {
            return Err(AppError::DuplicateName(item.name.clone()));
        }
        if item.available_quantity < 0 {
            return Err(AppError::InvalidQuantity);
        }
        let now = Utc::now();
        let created = Item {
            id: Uuid::new_v4(),
            name: item.name.clone(),
            category_id: item.category_id,
            description: item.description.clone(),
            image_key: item.image_key.clone(),
            available_quantity: item.available_quantity,
            created_at: now,
            updated_at: now,
        };
        self.working.items.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_item_details(&mut self, item_id: Uuid, details: &ItemDetails) -> Result<Item, AppError> {
        if self.working.name_taken(&details.name, Some(item_id)) {
            return Err(AppError::DuplicateName(details.name.clone()));
        }
        // Chave estrangeira de categoria
        if !self.working.categories.contains_key(&details.category_id) {
            return Err(AppError::InternalServerError(anyhow!(
                "categoria {} não existe",
                details.category_id
            )));
        }
        let item = self.working.items.get_mut(&item_id).ok_or(AppError::ItemNotFound)?;
        item.name = details.name.clone();
        item.category_id = details.category_id;
        item.description = details.description.clone();
        item.image_key = details.image_key.clone();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn set_available_quantity(&mut self, item_id: Uuid, quantity: i64) -> Result<Item, AppError> {
        // Espelha o CHECK (available_quantity >= 0) da tabela.
        if quantity < 0 {
            return Err(AppError::InvalidQuantity);
        }
        let item = self.working.items.get_mut(&item_id).ok_or(AppError::ItemNotFound)?;
        item.available_quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_item(&mut self, item_id: Uuid) -> Result<(), AppError> {
        self.working.items.remove(&item_id);
        // ON DELETE CASCADE
        self.working.lines.retain(|(_, item), _| *item != item_id);
        Ok(())
    }

    async fn total_available(&mut self) -> Result<i64, AppError> {
        Ok(self.working.items.values().map(|i| i.available_quantity).sum())
    }

    // ---
    // Empréstimos
    // ---

    async fn insert_lease(&mut self, user_id: Uuid) -> Result<Lease, AppError> {
        let now = Utc::now();
        let lease = Lease {
            id: Uuid::new_v4(),
            user_id,
            returned: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.leases.insert(lease.id, lease.clone());
        Ok(lease)
    }

    async fn lock_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError> {
        self.find_lease(lease_id).await
    }

    async fn find_lease(&mut self, lease_id: Uuid) -> Result<Option<Lease>, AppError> {
        Ok(self
            .working
            .leases
            .get(&lease_id)
            .filter(|l| l.deleted_at.is_none())
            .cloned())
    }

    async fn list_leases(&mut self, filter: &LeaseFilter) -> Result<Vec<Lease>, AppError> {
        let mut leases: Vec<Lease> = self
            .working
            .leases
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        leases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            leases.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(leases)
    }

    async fn set_lease_returned(&mut self, lease_id: Uuid, returned: bool) -> Result<Lease, AppError> {
        let lease = self
            .working
            .leases
            .get_mut(&lease_id)
            .filter(|l| l.deleted_at.is_none())
            .ok_or(AppError::LeaseNotFound)?;
        lease.returned = returned;
        lease.updated_at = Utc::now();
        Ok(lease.clone())
    }

    async fn touch_lease(&mut self, lease_id: Uuid) -> Result<Lease, AppError> {
        let lease = self
            .working
            .leases
            .get_mut(&lease_id)
            .filter(|l| l.deleted_at.is_none())
            .ok_or(AppError::LeaseNotFound)?;
        lease.updated_at = Utc::now();
        Ok(lease.clone())
    }

    async fn soft_delete_lease(&mut self, lease_id: Uuid) -> Result<(), AppError> {
        if let Some(lease) = self.working.leases.get_mut(&lease_id) {
            let now = Utc::now();
            lease.deleted_at = Some(now);
            lease.updated_at = now;
        }
        Ok(())
    }

    async fn count_leases_since(&mut self, since: DateTime<Utc>) -> Result<i64, AppError> {
        let count = self
            .working
            .leases
            .values()
            .filter(|l| l.deleted_at.is_none() && l.created_at >= since)
            .count();
        Ok(count as i64)
    }

    // ---
    // Linhas de empréstimo
    // ---

    async fn lease_lines(&mut self, lease_id: Uuid) -> Result<Vec<LeaseLineItem>, AppError> {
        Ok(self
            .working
            .lines
            .values()
            .filter(|l| l.lease_id == lease_id)
            .cloned()
            .collect())
    }

    async fn insert_lease_line(&mut self, lease_id: Uuid, item_id: Uuid, quantity: i64) -> Result<LeaseLineItem, AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }
        if self.working.lines.contains_key(&(lease_id, item_id)) {
            return Err(AppError::InternalServerError(anyhow!(
                "linha duplicada para o empréstimo {lease_id} e item {item_id}"
            )));
        }
        let line = LeaseLineItem { lease_id, item_id, quantity };
        self.working.lines.insert((lease_id, item_id), line.clone());
        Ok(line)
    }

    async fn delete_lease_lines(&mut self, lease_id: Uuid) -> Result<u64, AppError> {
        let before = self.working.lines.len();
        self.working.lines.retain(|(lease, _), _| *lease != lease_id);
        Ok((before - self.working.lines.len()) as u64)
    }

    async fn open_reservations_for_item(&mut self, item_id: Uuid) -> Result<i64, AppError> {
        let count = self
            .working
            .lines
            .values()
            .filter(|l| l.item_id == item_id && self.working.open_lease(l.lease_id))
            .count();
        Ok(count as i64)
    }

    async fn open_reservations_for_category(&mut self, category_id: Uuid) -> Result<i64, AppError> {
        let state = &self.working;
        let count = state
            .lines
            .values()
            .filter(|l| state.open_lease(l.lease_id))
            .filter(|l| {
                state
                    .items
                    .get(&l.item_id)
                    .map(|i| i.category_id == category_id)
                    .unwrap_or(false)
            })
            .count();
        Ok(count as i64)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
