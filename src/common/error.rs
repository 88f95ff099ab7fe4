// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

// Erro único da aplicação. Os serviços (ledger, leases, catálogo) devolvem
// sempre este tipo; o handler só converte para HTTP.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("{0}")]
    Unauthenticated(&'static str),

    // --- Catálogo ---
    #[error("Item não encontrado")]
    ItemNotFound,

    #[error("Categoria não encontrada")]
    CategoryNotFound,

    #[error("Já existe um registro com o nome '{0}'")]
    DuplicateName(String),

    #[error("O item '{item_name}' está reservado por um empréstimo aberto e não pode ser removido")]
    ItemDeleteFailed { item_name: String },

    #[error("A categoria '{category_name}' não pode ser removida")]
    CategoryDeleteFailed { category_name: String },

    #[error("A categoria '{category_name}' não pode ser renomeada")]
    CategoryUpdateFailed { category_name: String },

    #[error("Devolva todos os itens primeiro")]
    NotAllItemsReturned,

    // --- Estoque ---
    #[error("Estoque insuficiente para '{item_name}'. Solicitado: {requested}, Disponível: {available}")]
    InsufficientStock {
        item_name: String,
        requested: i64,
        available: i64,
    },

    #[error("A quantidade precisa ser maior que zero e o estoque não pode ficar negativo")]
    InvalidQuantity,

    // --- Empréstimos ---
    #[error("Empréstimo não encontrado")]
    LeaseNotFound,

    #[error("Um empréstimo precisa de pelo menos um item")]
    EmptyLease,

    #[error("Este empréstimo já foi fechado e não pode ser alterado")]
    LeaseAlreadyClosed,

    #[error("Este empréstimo já está aberto")]
    LeaseAlreadyOpened,

    #[error("O empréstimo {lease_id} precisa estar fechado para ser removido")]
    LeaseDeleteFailed { lease_id: Uuid },

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Identificador estável, lido pelos clientes para tratar o erro.
    pub fn identifier(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::UserNotFound => "user_not_found",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::ItemNotFound => "armory_item_not_found",
            AppError::CategoryNotFound => "category_not_found",
            AppError::DuplicateName(_) => "duplicate_name",
            AppError::ItemDeleteFailed { .. } => "armory_item_delete_failed",
            AppError::CategoryDeleteFailed { .. } => "category_delete_failed",
            AppError::CategoryUpdateFailed { .. } => "category_update_failed",
            AppError::NotAllItemsReturned => "not_all_items_returned",
            AppError::InsufficientStock { .. } => "insufficient_armory_item_stock",
            AppError::InvalidQuantity => "invalid_quantity",
            AppError::LeaseNotFound => "lease_not_found",
            AppError::EmptyLease => "empty_lease",
            AppError::LeaseAlreadyClosed => "lease_already_closed",
            AppError::LeaseAlreadyOpened => "lease_already_opened",
            AppError::LeaseDeleteFailed { .. } => "lease_delete_failed",
            AppError::DatabaseError(_) => "database_error",
            AppError::InternalServerError(_) => "unknown_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::EmptyLease => StatusCode::BAD_REQUEST,

            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,

            AppError::UserNotFound
            | AppError::ItemNotFound
            | AppError::CategoryNotFound
            | AppError::LeaseNotFound => StatusCode::NOT_FOUND,

            AppError::DuplicateName(_)
            | AppError::InsufficientStock { .. }
            | AppError::InvalidQuantity
            | AppError::LeaseAlreadyClosed
            | AppError::LeaseAlreadyOpened
            | AppError::LeaseDeleteFailed { .. }
            | AppError::ItemDeleteFailed { .. }
            | AppError::CategoryDeleteFailed { .. }
            | AppError::CategoryUpdateFailed { .. }
            | AppError::NotAllItemsReturned => StatusCode::CONFLICT,

            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let identifier = self.identifier();

        if let AppError::ValidationError(errors) = &self {
            let mut details = std::collections::HashMap::new();
            for (field, field_errors) in errors.field_errors() {
                let messages: Vec<String> = field_errors
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .collect();
                details.insert(field.to_string(), messages);
            }
            let body = Json(json!({
                "error": identifier,
                "message": "Um ou mais campos são inválidos.",
                "details": details,
            }));
            return (status, body).into_response();
        }

        // Erros de infraestrutura: loga o detalhe, devolve mensagem genérica.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Erro Interno do Servidor: {}", self);
            "Ocorreu um erro inesperado.".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({ "error": identifier, "message": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_item_and_quantities() {
        let err = AppError::InsufficientStock {
            item_name: "Rope50m".into(),
            requested: 8,
            available: 7,
        };
        assert_eq!(
            err.to_string(),
            "Estoque insuficiente para 'Rope50m'. Solicitado: 8, Disponível: 7"
        );
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.identifier(), "insufficient_armory_item_stock");
    }

    #[test]
    fn not_found_variants_map_to_404() {
        for err in [AppError::ItemNotFound, AppError::LeaseNotFound, AppError::CategoryNotFound] {
            assert_eq!(err.status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let response = AppError::InternalServerError(anyhow::anyhow!("pool exhausted")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
