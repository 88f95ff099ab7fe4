// src/services/change_notifier.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::models::events::{EventEnvelope, EventType};

/// Identificador opaco do cliente conectado (hoje, o id do usuário).
pub type ClientId = Uuid;

struct Subscriber {
    connection_id: u64,
    sender: mpsc::Sender<Arc<str>>,
}

struct NotifierInner {
    subscribers: RwLock<HashMap<ClientId, Subscriber>>,
    buffer: usize,
    next_connection: AtomicU64,
}

/// Fila de saída de uma conexão. Quem a recebe (o handler do WebSocket)
/// drena `receiver` e escreve no socket.
pub struct Subscription {
    pub client_id: ClientId,
    connection_id: u64,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

/// Distribui eventos para todos os clientes conectados.
///
/// `publish` nunca espera por um cliente: cada conexão tem uma fila limitada
/// e a mensagem é entregue com `try_send`. Fila cheia descarta a mensagem
/// para aquele cliente; fila fechada remove o registro. Nenhum erro volta
/// para quem publicou.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Arc<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                subscribers: RwLock::new(HashMap::new()),
                buffer: buffer.max(1),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Registra o cliente. Uma nova conexão do mesmo cliente substitui a anterior.
    pub fn connect(&self, client_id: ClientId) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.buffer);
        let connection_id = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);

        let previous = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client_id, Subscriber { connection_id, sender });

        if previous.is_some() {
            tracing::debug!(%client_id, "Conexão anterior substituída");
        }
        tracing::info!(%client_id, connection_id, "Cliente conectado ao WebSocket");

        Subscription {
            client_id,
            connection_id,
            receiver,
        }
    }

    /// Encerra a conexão. O registro só sai se ainda for desta conexão
    /// (o cliente pode ter reconectado nesse meio tempo); chamar de novo
    /// não tem efeito.
    pub fn disconnect(&self, subscription: &Subscription) -> bool {
        let removed = self.remove_connection(subscription.client_id, subscription.connection_id);
        if removed {
            tracing::info!(client_id = %subscription.client_id, "Cliente desconectado");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Serializa o evento uma única vez e entrega a todos os clientes.
    /// Devolve quantos clientes receberam a mensagem na fila.
    pub fn publish<T: Serialize>(&self, event_type: EventType, payload: &T) -> usize {
        let Some(message) = encode(event_type, payload) else {
            return 0;
        };

        // Copia os destinos e solta o lock antes de entregar.
        let targets: Vec<(ClientId, u64, mpsc::Sender<Arc<str>>)> = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, s)| (*id, s.connection_id, s.sender.clone()))
            .collect();

        let mut delivered = 0;
        for (client_id, connection_id, sender) in targets {
            if self.offer(client_id, connection_id, &sender, &message) {
                delivered += 1;
            }
        }

        tracing::debug!(?event_type, delivered, "Evento publicado");
        delivered
    }

    /// Entrega um evento a um único cliente (ex.: painel inicial após conectar).
    pub fn send_to<T: Serialize>(&self, client_id: ClientId, event_type: EventType, payload: &T) -> bool {
        let target = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&client_id)
            .map(|s| (s.connection_id, s.sender.clone()));

        let Some((connection_id, sender)) = target else {
            return false;
        };
        let Some(message) = encode(event_type, payload) else {
            return false;
        };
        self.offer(client_id, connection_id, &sender, &message)
    }

    fn offer(&self, client_id: ClientId, connection_id: u64, sender: &mpsc::Sender<Arc<str>>, message: &Arc<str>) -> bool {
        match sender.try_send(message.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%client_id, "Cliente lento: mensagem descartada");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(%client_id, "Conexão encerrada: removendo cliente");
                self.remove_connection(client_id, connection_id);
                false
            }
        }
    }

    fn remove_connection(&self, client_id: ClientId, connection_id: u64) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let current = subscribers
            .get(&client_id)
            .map(|s| s.connection_id == connection_id)
            .unwrap_or(false);
        if current {
            subscribers.remove(&client_id);
        }
        current
    }
}

fn encode<T: Serialize>(event_type: EventType, payload: &T) -> Option<Arc<str>> {
    let envelope = EventEnvelope {
        event_type,
        data: payload,
    };
    match serde_json::to_string(&envelope) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            tracing::warn!(?event_type, error = %e, "Falha ao serializar evento");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parse(message: Arc<str>) -> Value {
        serde_json::from_str(&message).unwrap()
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let notifier = ChangeNotifier::new(8);
        let mut a = notifier.connect(Uuid::new_v4());
        let mut b = notifier.connect(Uuid::new_v4());

        let delivered = notifier.publish(EventType::ItemUpdated, &json!({ "name": "Rope50m" }));
        assert_eq!(delivered, 2);

        for sub in [&mut a, &mut b] {
            let value = parse(sub.receiver.recv().await.unwrap());
            assert_eq!(value["type"], "itemUpdated");
            assert_eq!(value["data"]["name"], "Rope50m");
        }
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_others() {
        let notifier = ChangeNotifier::new(1);
        let _slow = notifier.connect(Uuid::new_v4());
        let mut fast = notifier.connect(Uuid::new_v4());

        assert_eq!(notifier.publish(EventType::LeaseUpdated, &1), 2);
        fast.receiver.recv().await.unwrap();

        // A fila do cliente lento está cheia; o outro continua recebendo.
        assert_eq!(notifier.publish(EventType::LeaseUpdated, &2), 1);
        let value = parse(fast.receiver.recv().await.unwrap());
        assert_eq!(value["data"], 2);
        assert_eq!(notifier.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn closed_subscriber_is_removed_on_publish() {
        let notifier = ChangeNotifier::new(4);
        let gone = notifier.connect(Uuid::new_v4());
        drop(gone);

        assert_eq!(notifier.publish(EventType::ItemDeleted, &"x"), 0);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn connect_and_disconnect_are_idempotent() {
        let notifier = ChangeNotifier::new(4);
        let client = Uuid::new_v4();

        let first = notifier.connect(client);
        let mut second = notifier.connect(client);
        assert_eq!(notifier.subscriber_count(), 1);

        // A conexão antiga não derruba a nova.
        assert!(!notifier.disconnect(&first));
        assert_eq!(notifier.subscriber_count(), 1);
        notifier.publish(EventType::CategoryCreated, &"c");
        assert!(second.receiver.recv().await.is_some());

        assert!(notifier.disconnect(&second));
        assert!(!notifier.disconnect(&second));
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn send_to_targets_a_single_client() {
        let notifier = ChangeNotifier::new(4);
        let target = Uuid::new_v4();
        let mut a = notifier.connect(target);
        let mut b = notifier.connect(Uuid::new_v4());

        assert!(notifier.send_to(target, EventType::DashboardUpdate, &json!({ "leasedToday": 0 })));
        assert_eq!(parse(a.receiver.recv().await.unwrap())["type"], "dashboardUpdate");
        assert!(b.receiver.try_recv().is_err());

        assert!(!notifier.send_to(Uuid::new_v4(), EventType::DashboardUpdate, &0));
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let notifier = ChangeNotifier::new(4);
        assert_eq!(notifier.publish(EventType::LeaseDeleted, &json!({ "id": 1 })), 0);
    }
}
