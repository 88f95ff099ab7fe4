// src/models/inventory.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Nome da categoria de fallback, criada pela migração inicial.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

// --- 1. Categorias ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub image_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_CATEGORY_NAME
    }
}

// Versão resumida embutida nos snapshots de item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

// --- 2. Itens do arsenal ---
// `available_quantity` só é alterado pelo StockLedger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub category_id: Uuid,
    pub description: String,
    pub image_key: Option<String>,
    pub available_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item com a categoria resolvida, pronto para a API e para o WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    #[serde(flatten)]
    pub item: Item,
    pub category: CategorySummary,
}

// Campos editáveis de um item (já com a categoria resolvida).
// O estoque fica de fora: só o StockLedger mexe nele.
#[derive(Debug, Clone)]
pub struct ItemDetails {
    pub name: String,
    pub category_id: Uuid,
    pub description: String,
    pub image_key: Option<String>,
}

// Dados para cadastrar um item (já com a categoria resolvida).
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub category_id: Uuid,
    pub description: String,
    pub image_key: Option<String>,
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemFilter {
    /// Busca parcial, sem diferenciar maiúsculas.
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map(|needle| item.name.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(true);
        let category_ok = self.category_id.map(|c| c == item.category_id).unwrap_or(true);
        name_ok && category_ok
    }
}

// Corpo enviado nos eventos `itemDeleted` e `categoryDeleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeletedEntity {
    pub id: Uuid,
}

// --- 3. Payloads da API de catálogo ---
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: String,
    pub image_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: String,
    // Sem categoria => "Default"
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    pub image_key: Option<String>,
    #[validate(range(min = 0, message = "A quantidade inicial não pode ser negativa."))]
    pub available_quantity: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockPayload {
    /// Positivo para entrada, negativo para baixa.
    pub delta: i64,
}

// PUT /api/items/{id}: substitui todos os campos editáveis.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: String,
    // Sem categoria => "Default"
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub description: String,
    pub image_key: Option<String>,
}

// PATCH /api/items/{id}: só o que vier preenchido muda.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchItemPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: Option<String>,
    pub category_id: Option<Uuid>,
    pub description: Option<String>,
    pub image_key: Option<String>,
}

// PUT /api/categories/{id}
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: String,
    pub image_key: Option<String>,
}

// PATCH /api/categories/{id}
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchCategoryPayload {
    #[validate(length(min = 1, max = 100, message = "Nome obrigatório (até 100 caracteres)."))]
    pub name: Option<String>,
    pub image_key: Option<String>,
}
