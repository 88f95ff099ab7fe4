// src/models/dashboard.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{inventory::ItemSnapshot, lease::LeaseSnapshot};

// Enviado como `dashboardUpdate` logo após a conexão do WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub latest_leases: Vec<LeaseSnapshot>,
    pub recently_added_items: Vec<ItemSnapshot>,
    pub items_in_armory: i64, // Soma do estoque disponível
    pub leased_today: i64,    // Empréstimos criados hoje (UTC)
}
