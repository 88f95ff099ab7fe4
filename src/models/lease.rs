// src/models/lease.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{inventory::ItemSnapshot, user::UserSummary};

// --- 1. Empréstimo ---
// `returned == false` => Aberto, `returned == true` => Fechado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    pub id: Uuid,
    pub user_id: Uuid,
    pub returned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum LeaseState {
    Open,
    Closed,
}

impl Lease {
    pub fn state(&self) -> LeaseState {
        if self.returned { LeaseState::Closed } else { LeaseState::Open }
    }
}

// --- 2. Linha do empréstimo (reserva de um item) ---
// Única por (lease_id, item_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaseLineItem {
    pub lease_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
}

// Uma entrada do pedido: "quero N unidades deste item".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub item_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeasePayload {
    #[validate(length(min = 1, message = "Informe pelo menos um item."))]
    pub items: Vec<ReservationRequest>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeasePayload {
    pub items: Vec<ReservationRequest>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaseFilter {
    pub user_id: Option<Uuid>,
    pub returned: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "O limite não pode ser negativo."))]
    pub limit: Option<i64>,
}

impl LeaseFilter {
    pub fn matches(&self, lease: &Lease) -> bool {
        lease.deleted_at.is_none()
            && self.user_id.map(|u| u == lease.user_id).unwrap_or(true)
            && self.returned.map(|r| r == lease.returned).unwrap_or(true)
            && self.from.map(|from| lease.created_at >= from).unwrap_or(true)
            && self.to.map(|to| lease.created_at < to).unwrap_or(true)
    }
}

// --- 3. Snapshot completo (API e WebSocket) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaseLineSnapshot {
    pub item: ItemSnapshot,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaseSnapshot {
    pub id: Uuid,
    pub user: UserSummary,
    pub returned: bool,
    pub items: Vec<LeaseLineSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
