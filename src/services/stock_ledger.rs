// src/services/stock_ledger.rs

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RepositoryTx,
    models::inventory::Item,
};

/// Único ponto que altera `available_quantity`.
///
/// Todas as operações recebem a transação do caso de uso que as chamou:
/// nada aqui faz commit. A conferência do saldo acontece depois do lock da
/// linha do item, dentro da mesma transação, então duas reservas
/// concorrentes do mesmo item nunca passam juntas se não couberem no estoque.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockLedger;

impl StockLedger {
    pub fn new() -> Self {
        Self
    }

    /// Bloqueia todos os itens envolvidos num caso de uso de uma vez,
    /// sempre na mesma ordem (id crescente).
    pub async fn lock_items(
        &self,
        tx: &mut dyn RepositoryTx,
        item_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Item>, AppError> {
        let mut ids = item_ids.to_vec();
        ids.sort();
        ids.dedup();
        let items = tx.lock_items(&ids).await?;
        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }

    async fn lock_one(&self, tx: &mut dyn RepositoryTx, item_id: Uuid) -> Result<Item, AppError> {
        tx.lock_items(&[item_id])
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::ItemNotFound)
    }

    /// Retira `quantity` unidades do estoque disponível.
    pub async fn reserve(
        &self,
        tx: &mut dyn RepositoryTx,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<Item, AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }

        let item = self.lock_one(tx, item_id).await?;
        if item.available_quantity < quantity {
            return Err(AppError::InsufficientStock {
                item_name: item.name,
                requested: quantity,
                available: item.available_quantity,
            });
        }

        let updated = tx
            .set_available_quantity(item_id, item.available_quantity - quantity)
            .await?;
        tracing::debug!(%item_id, quantity, available = updated.available_quantity, "Estoque reservado");
        Ok(updated)
    }

    /// Devolve `quantity` unidades ao estoque. Inverso de `reserve`.
    pub async fn release(
        &self,
        tx: &mut dyn RepositoryTx,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<Item, AppError> {
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity);
        }

        let item = self.lock_one(tx, item_id).await?;
        let restored = item
            .available_quantity
            .checked_add(quantity)
            .ok_or(AppError::InvalidQuantity)?;

        let updated = tx.set_available_quantity(item_id, restored).await?;
        tracing::debug!(%item_id, quantity, available = updated.available_quantity, "Estoque liberado");
        Ok(updated)
    }

    /// Correção administrativa (positiva ou negativa). O saldo final não pode
    /// ficar negativo.
    pub async fn adjust(
        &self,
        tx: &mut dyn RepositoryTx,
        item_id: Uuid,
        delta: i64,
    ) -> Result<Item, AppError> {
        let item = self.lock_one(tx, item_id).await?;
        let adjusted = item
            .available_quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or(AppError::InvalidQuantity)?;

        let updated = tx.set_available_quantity(item_id, adjusted).await?;
        tracing::info!(%item_id, delta, available = updated.available_quantity, "Estoque ajustado");
        Ok(updated)
    }
}
