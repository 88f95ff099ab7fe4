// src/handlers/realtime.rs
//
// WebSocket do painel: `GET /armory?client=<uuid>`.
// Cada conexão tem uma task que drena a própria fila do ChangeNotifier e
// escreve no socket; o publish nunca espera por ela.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{config::AppState, models::events::EventType};

// Código de fechamento para cliente recusado (policy violation).
const CLOSE_POLICY: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub client: Option<String>,
}

pub async fn armory_socket(
    State(app_state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app_state, params.client, socket))
}

// Confere se o id é um UUID de um usuário existente.
async fn resolve_client(app_state: &AppState, raw: Option<&str>) -> Option<Uuid> {
    let client_id = Uuid::parse_str(raw?.trim()).ok()?;

    let mut tx = app_state.repo.begin().await.ok()?;
    let user = tx.find_user(client_id).await.ok()??;
    tx.commit().await.ok()?;
    Some(user.id)
}

async fn reject(mut socket: WebSocket, reason: &'static str) {
    let frame = CloseFrame {
        code: CLOSE_POLICY,
        reason: reason.into(),
    };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

async fn handle_socket(app_state: AppState, raw_client: Option<String>, mut socket: WebSocket) {
    let Some(client_id) = resolve_client(&app_state, raw_client.as_deref()).await else {
        tracing::warn!(client = ?raw_client, "Conexão WebSocket recusada: cliente desconhecido");
        reject(socket, "unknown client").await;
        return;
    };

    let mut subscription = app_state.notifier.connect(client_id);
    tracing::debug!(%client_id, online = app_state.notifier.subscriber_count(), "Painel conectado");

    // Painel inicial só para quem acabou de conectar
    match app_state.dashboard_service.get_snapshot().await {
        Ok(snapshot) => {
            app_state
                .notifier
                .send_to(client_id, EventType::DashboardUpdate, &snapshot);
        }
        Err(e) => tracing::warn!(%client_id, error = %e, "Falha ao montar o painel inicial"),
    }

    loop {
        tokio::select! {
            outbound = subscription.receiver.recv() => {
                let Some(message) = outbound else {
                    // Registro substituído por uma nova conexão do mesmo cliente
                    break;
                };
                if socket.send(Message::Text(message.to_string().into())).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // O protocolo é só de saída; o resto é ignorado
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    app_state.notifier.disconnect(&subscription);
    tracing::info!(%client_id, "Conexão WebSocket encerrada");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{AppConfig, StorageKind},
        db::MemoryRepository,
        models::user::UserSummary,
    };

    async fn state_with_user() -> (AppState, Uuid) {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();
        repo.insert_user(UserSummary {
            id: user_id,
            first_name: "Carla".into(),
            last_name: "Souza".into(),
            email: "carla@armory.local".into(),
            image_key: None,
            is_admin: false,
        })
        .await;
        let config = AppConfig {
            storage: StorageKind::Memory,
            database_url: None,
            bind_addr: "127.0.0.1:0".into(),
            db_max_connections: 5,
            notifier_buffer: 8,
            dashboard_latest: 5,
        };
        (AppState::with_repository(Arc::new(repo), &config), user_id)
    }

    #[tokio::test]
    async fn known_user_is_accepted() {
        let (state, user_id) = state_with_user().await;
        assert_eq!(resolve_client(&state, Some(&user_id.to_string())).await, Some(user_id));

        let padded = format!("  {user_id} ");
        assert_eq!(resolve_client(&state, Some(&padded)).await, Some(user_id));
    }

    #[tokio::test]
    async fn unknown_or_malformed_client_is_refused() {
        let (state, _) = state_with_user().await;
        assert_eq!(resolve_client(&state, None).await, None);
        assert_eq!(resolve_client(&state, Some("")).await, None);
        assert_eq!(resolve_client(&state, Some("not-a-uuid")).await, None);
        assert_eq!(resolve_client(&state, Some(&Uuid::new_v4().to_string())).await, None);
    }
}
