// src/models/events.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Tipos de mensagem enviados pelo WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    // Itens
    ItemCreated,
    ItemUpdated,
    ItemDeleted,

    // Categorias
    CategoryCreated,
    CategoryUpdated,
    CategoryDeleted,

    // Empréstimos
    LeaseCreated,
    LeaseUpdated,
    LeaseDeleted,

    // Painel
    DashboardUpdate,
}

/// Envelope `{ "type": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: &'a T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_uses_camel_case_type_names() {
        let payload = json!({ "id": 1 });
        let envelope = EventEnvelope {
            event_type: EventType::LeaseCreated,
            data: &payload,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({ "type": "leaseCreated", "data": { "id": 1 } }));
    }

    #[test]
    fn dashboard_update_name() {
        let value = serde_json::to_value(EventType::DashboardUpdate).unwrap();
        assert_eq!(value, json!("dashboardUpdate"));
    }
}
