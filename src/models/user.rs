// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// O cadastro de usuários pertence ao sistema de autenticação externo.
// Aqui só lemos o necessário para montar os snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_key: Option<String>,
    pub is_admin: bool,
}
