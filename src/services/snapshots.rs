// src/services/snapshots.rs
//
// Montagem dos snapshots completos (empréstimo + usuário + itens + categorias)
// enviados pela API e pelo WebSocket. Sempre dentro da transação do caso de
// uso, para o snapshot refletir exatamente o que foi gravado.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RepositoryTx,
    models::{
        inventory::{Category, CategorySummary, Item, ItemSnapshot},
        lease::{Lease, LeaseLineSnapshot, LeaseSnapshot},
    },
};

// Cache simples de categorias por snapshot.
#[derive(Default)]
pub(crate) struct SnapshotBuilder {
    categories: HashMap<Uuid, Category>,
}

impl SnapshotBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn item(&mut self, tx: &mut dyn RepositoryTx, item: Item) -> Result<ItemSnapshot, AppError> {
        let category = match self.categories.get(&item.category_id) {
            Some(category) => CategorySummary::from(category),
            None => {
                let category = tx
                    .find_category(item.category_id)
                    .await?
                    .ok_or(AppError::CategoryNotFound)?;
                let summary = CategorySummary::from(&category);
                self.categories.insert(category.id, category);
                summary
            }
        };
        Ok(ItemSnapshot { item, category })
    }

    pub(crate) async fn items(&mut self, tx: &mut dyn RepositoryTx, items: Vec<Item>) -> Result<Vec<ItemSnapshot>, AppError> {
        let mut snapshots = Vec::with_capacity(items.len());
        for item in items {
            snapshots.push(self.item(tx, item).await?);
        }
        Ok(snapshots)
    }

    /// Relê os itens pelo id (estado atual dentro da transação).
    pub(crate) async fn items_by_id(&mut self, tx: &mut dyn RepositoryTx, item_ids: &[Uuid]) -> Result<Vec<ItemSnapshot>, AppError> {
        let mut snapshots = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            let item = tx.find_item(*item_id).await?.ok_or(AppError::ItemNotFound)?;
            snapshots.push(self.item(tx, item).await?);
        }
        Ok(snapshots)
    }

    pub(crate) async fn lease(&mut self, tx: &mut dyn RepositoryTx, lease: Lease) -> Result<LeaseSnapshot, AppError> {
        let user = tx.find_user(lease.user_id).await?.ok_or(AppError::UserNotFound)?;

        let lines = tx.lease_lines(lease.id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = tx.find_item(line.item_id).await?.ok_or(AppError::ItemNotFound)?;
            items.push(LeaseLineSnapshot {
                item: self.item(tx, item).await?,
                quantity: line.quantity,
            });
        }

        Ok(LeaseSnapshot {
            id: lease.id,
            user,
            returned: lease.returned,
            items,
            created_at: lease.created_at,
            updated_at: lease.updated_at,
        })
    }

    pub(crate) async fn leases(&mut self, tx: &mut dyn RepositoryTx, leases: Vec<Lease>) -> Result<Vec<LeaseSnapshot>, AppError> {
        let mut snapshots = Vec::with_capacity(leases.len());
        for lease in leases {
            snapshots.push(self.lease(tx, lease).await?);
        }
        Ok(snapshots)
    }
}
