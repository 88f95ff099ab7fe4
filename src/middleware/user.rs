// src/middleware/user.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// A autenticação fica num sistema externo; ele repassa o usuário neste cabeçalho.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Usuário que fez a requisição (cabeçalho `X-User-Id`).
#[derive(Debug, Clone, Copy)]
pub struct RequestUser(pub Uuid);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(AppError::Unauthenticated("O cabeçalho X-User-Id é obrigatório."))?;

        let value = value
            .to_str()
            .map_err(|_| AppError::Unauthenticated("Cabeçalho X-User-Id contém caracteres inválidos."))?;

        let user_id = Uuid::parse_str(value.trim())
            .map_err(|_| AppError::Unauthenticated("Cabeçalho X-User-Id inválido (não é um UUID)."))?;

        Ok(RequestUser(user_id))
    }
}
