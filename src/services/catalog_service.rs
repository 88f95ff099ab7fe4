// src/services/catalog_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::Repository,
    models::{
        events::EventType,
        inventory::{
            Category, CreateCategoryPayload, CreateItemPayload, DeletedEntity, ItemDetails,
            ItemFilter, ItemSnapshot, NewItem, PatchCategoryPayload, PatchItemPayload,
            UpdateCategoryPayload, UpdateItemPayload, DEFAULT_CATEGORY_NAME,
        },
    },
    services::{change_notifier::ChangeNotifier, snapshots::SnapshotBuilder, stock_ledger::StockLedger},
};

// Para onde vai a categoria de um item editado.
enum CategoryChoice {
    Keep,
    Default,
    Set(Uuid),
}

// Edição de item já normalizada (PUT e PATCH chegam aqui).
struct ItemEdit {
    name: Option<String>,
    category: CategoryChoice,
    description: Option<String>,
    image_key: Option<Option<String>>,
}

// Cadastro de categorias e itens do arsenal.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn Repository>,
    ledger: StockLedger,
    notifier: ChangeNotifier,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn Repository>, ledger: StockLedger, notifier: ChangeNotifier) -> Self {
        Self { repo, ledger, notifier }
    }

    // ---
    // Categorias
    // ---

    pub async fn create_category(&self, payload: CreateCategoryPayload) -> Result<Category, AppError> {
        let name = payload.name.trim();

        let mut tx = self.repo.begin().await?;
        if tx.find_category_by_name(name).await?.is_some() {
            return Err(AppError::DuplicateName(name.to_string()));
        }
        let category = tx.insert_category(name, payload.image_key.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(category_id = %category.id, name = %category.name, "Categoria criada");
        self.notifier.publish(EventType::CategoryCreated, &category);
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let mut tx = self.repo.begin().await?;
        let categories = tx.list_categories().await?;
        tx.commit().await?;
        Ok(categories)
    }

    /// Substitui nome e imagem da categoria.
    pub async fn update_category(
        &self,
        category_id: Uuid,
        payload: UpdateCategoryPayload,
    ) -> Result<Category, AppError> {
        self.edit_category(category_id, Some(payload.name), Some(payload.image_key))
            .await
    }

    pub async fn patch_category(
        &self,
        category_id: Uuid,
        payload: PatchCategoryPayload,
    ) -> Result<Category, AppError> {
        self.edit_category(category_id, payload.name, payload.image_key.map(Some))
            .await
    }

    async fn edit_category(
        &self,
        category_id: Uuid,
        name: Option<String>,
        image_key: Option<Option<String>>,
    ) -> Result<Category, AppError> {
        let mut tx = self.repo.begin().await?;

        let current = tx
            .find_category(category_id)
            .await?
            .ok_or(AppError::CategoryNotFound)?;
        let name = name
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| current.name.clone());

        if name != current.name {
            // "Default" é referenciada pelo nome
            if current.is_default() {
                return Err(AppError::CategoryUpdateFailed { category_name: current.name });
            }
            if let Some(other) = tx.find_category_by_name(&name).await? {
                if other.id != category_id {
                    return Err(AppError::DuplicateName(name));
                }
            }
        }

        let image_key = image_key.unwrap_or(current.image_key);
        let category = tx
            .update_category(category_id, &name, image_key.as_deref())
            .await?;

        // Os snapshots dos itens carregam o nome da categoria
        let items = tx
            .list_items(&ItemFilter { name: None, category_id: Some(category_id) })
            .await?;
        let items = SnapshotBuilder::new().items(tx.as_mut(), items).await?;
        tx.commit().await?;

        tracing::info!(%category_id, name = %category.name, "Categoria atualizada");
        self.notifier.publish(EventType::CategoryUpdated, &category);
        for item in &items {
            self.notifier.publish(EventType::ItemUpdated, item);
        }
        Ok(category)
    }

    /// Remove a categoria e move os itens dela para "Default".
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.repo.begin().await?;

        let category = tx
            .find_category(category_id)
            .await?
            .ok_or(AppError::CategoryNotFound)?;
        if category.is_default() {
            return Err(AppError::CategoryDeleteFailed { category_name: category.name });
        }

        // Itens emprestados em aberto seguram a categoria
        if tx.open_reservations_for_category(category_id).await? > 0 {
            return Err(AppError::NotAllItemsReturned);
        }

        let default = tx
            .find_category_by_name(DEFAULT_CATEGORY_NAME)
            .await?
            .ok_or(AppError::CategoryNotFound)?;
        let moved = tx.reassign_items(category_id, default.id).await?;
        tx.delete_category(category_id).await?;

        let moved = SnapshotBuilder::new().items(tx.as_mut(), moved).await?;
        tx.commit().await?;
        tracing::info!(%category_id, moved = moved.len(), "Categoria removida");

        for item in &moved {
            self.notifier.publish(EventType::ItemUpdated, item);
        }
        self.notifier.publish(EventType::CategoryDeleted, &DeletedEntity { id: category_id });
        Ok(())
    }

    // ---
    // Itens
    // ---

    pub async fn create_item(&self, payload: CreateItemPayload) -> Result<ItemSnapshot, AppError> {
        if payload.available_quantity < 0 {
            return Err(AppError::InvalidQuantity);
        }
        let name = payload.name.trim().to_string();

        let mut tx = self.repo.begin().await?;

        // 1. Categoria informada ou "Default"
        let category = match payload.category_id {
            Some(id) => tx.find_category(id).await?.ok_or(AppError::CategoryNotFound)?,
            None => tx
                .find_category_by_name(DEFAULT_CATEGORY_NAME)
                .await?
                .ok_or(AppError::CategoryNotFound)?,
        };

        // 2. Nome único
        let taken = tx
            .list_items(&ItemFilter { name: Some(name.clone()), category_id: None })
            .await?
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&name));
        if taken {
            return Err(AppError::DuplicateName(name));
        }

        // 3. Grava
        let item = tx
            .insert_item(&NewItem {
                name,
                category_id: category.id,
                description: payload.description,
                image_key: payload.image_key,
                available_quantity: payload.available_quantity,
            })
            .await?;
        let snapshot = SnapshotBuilder::new().item(tx.as_mut(), item).await?;
        tx.commit().await?;

        tracing::info!(item_id = %snapshot.item.id, name = %snapshot.item.name, "Item cadastrado");
        self.notifier.publish(EventType::ItemCreated, &snapshot);
        Ok(snapshot)
    }

    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<ItemSnapshot>, AppError> {
        let mut tx = self.repo.begin().await?;
        let items = tx.list_items(filter).await?;
        let snapshots = SnapshotBuilder::new().items(tx.as_mut(), items).await?;
        tx.commit().await?;
        Ok(snapshots)
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<ItemSnapshot, AppError> {
        let mut tx = self.repo.begin().await?;
        let item = tx.find_item(item_id).await?.ok_or(AppError::ItemNotFound)?;
        let snapshot = SnapshotBuilder::new().item(tx.as_mut(), item).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Substitui os dados cadastrais do item. Sem categoria => "Default".
    pub async fn update_item(
        &self,
        item_id: Uuid,
        payload: UpdateItemPayload,
    ) -> Result<ItemSnapshot, AppError> {
        let edit = ItemEdit {
            name: Some(payload.name),
            category: payload
                .category_id
                .map(CategoryChoice::Set)
                .unwrap_or(CategoryChoice::Default),
            description: Some(payload.description),
            image_key: Some(payload.image_key),
        };
        self.edit_item(item_id, edit).await
    }

    pub async fn patch_item(
        &self,
        item_id: Uuid,
        payload: PatchItemPayload,
    ) -> Result<ItemSnapshot, AppError> {
        let edit = ItemEdit {
            name: payload.name,
            category: payload
                .category_id
                .map(CategoryChoice::Set)
                .unwrap_or(CategoryChoice::Keep),
            description: payload.description,
            image_key: payload.image_key.map(Some),
        };
        self.edit_item(item_id, edit).await
    }

    // O estoque não muda aqui; o lock só serializa com empréstimos e remoções.
    async fn edit_item(&self, item_id: Uuid, edit: ItemEdit) -> Result<ItemSnapshot, AppError> {
        let mut tx = self.repo.begin().await?;

        let current = self
            .ledger
            .lock_items(tx.as_mut(), &[item_id])
            .await?
            .remove(&item_id)
            .ok_or(AppError::ItemNotFound)?;

        let category_id = match edit.category {
            CategoryChoice::Keep => current.category_id,
            CategoryChoice::Default => {
                tx.find_category_by_name(DEFAULT_CATEGORY_NAME)
                    .await?
                    .ok_or(AppError::CategoryNotFound)?
                    .id
            }
            CategoryChoice::Set(id) => tx.find_category(id).await?.ok_or(AppError::CategoryNotFound)?.id,
        };

        let name = edit
            .name
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| current.name.clone());
        let taken = tx
            .list_items(&ItemFilter { name: Some(name.clone()), category_id: None })
            .await?
            .iter()
            .any(|i| i.id != item_id && i.name.eq_ignore_ascii_case(&name));
        if taken {
            return Err(AppError::DuplicateName(name));
        }

        let details = ItemDetails {
            name,
            category_id,
            description: edit.description.unwrap_or(current.description),
            image_key: edit.image_key.unwrap_or(current.image_key),
        };
        let item = tx.update_item_details(item_id, &details).await?;
        let snapshot = SnapshotBuilder::new().item(tx.as_mut(), item).await?;
        tx.commit().await?;

        tracing::info!(%item_id, name = %snapshot.item.name, "Item atualizado");
        self.notifier.publish(EventType::ItemUpdated, &snapshot);
        Ok(snapshot)
    }

    /// Remove o item. Recusado enquanto algum empréstimo aberto o reservar;
    /// linhas de empréstimos já fechados saem junto.
    pub async fn delete_item(&self, item_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.repo.begin().await?;

        let item = self
            .ledger
            .lock_items(tx.as_mut(), &[item_id])
            .await?
            .remove(&item_id)
            .ok_or(AppError::ItemNotFound)?;

        if tx.open_reservations_for_item(item_id).await? > 0 {
            return Err(AppError::ItemDeleteFailed { item_name: item.name });
        }

        tx.delete_item(item_id).await?;
        tx.commit().await?;

        tracing::info!(%item_id, name = %item.name, "Item removido");
        self.notifier.publish(EventType::ItemDeleted, &DeletedEntity { id: item_id });
        Ok(())
    }

    /// Ajuste manual do estoque (entrada ou baixa), sempre pelo ledger.
    pub async fn adjust_stock(&self, item_id: Uuid, delta: i64) -> Result<ItemSnapshot, AppError> {
        let mut tx = self.repo.begin().await?;
        let item = self.ledger.adjust(tx.as_mut(), item_id, delta).await?;
        let snapshot = SnapshotBuilder::new().item(tx.as_mut(), item).await?;
        tx.commit().await?;

        self.notifier.publish(EventType::ItemUpdated, &snapshot);
        Ok(snapshot)
    }
}
