use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{Broker, BrokerId, Message, SubscriberId};
use crate::DeliveryError;

/// Возможности, которые ядро брокера получает от внешнего транспорта.
///
/// Оба метода считаются best-effort: брокер запускает их в отдельных
/// задачах и только сообщает об ошибках, не повторяя попыток.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Доставить сообщение подписчику.
    async fn deliver(
        &self,
        subscriber: &SubscriberId,
        message: Message,
    ) -> Result<(), DeliveryError>;

    /// Переслать сообщение соседнему брокеру.
    async fn forward(
        &self,
        peer: &BrokerId,
        message: Message,
    ) -> Result<(), DeliveryError>;
}

/// Транспорт внутри одного процесса.
///
/// Подписчики получают сообщения через неограниченные mpsc-каналы tokio,
/// соседние брокеры вызываются напрямую через `accept_message`. Брокеры
/// хранятся как `Weak`, поэтому транспорт не продлевает им жизнь.
#[derive(Default)]
pub struct InProcessTransport {
    subscribers: DashMap<SubscriberId, mpsc::UnboundedSender<Message>>,
    brokers: DashMap<BrokerId, Weak<Broker>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует конечную точку подписчика и возвращает её приёмник.
    ///
    /// Повторная регистрация того же id заменяет прежний канал.
    pub fn endpoint(
        &self,
        subscriber: impl Into<SubscriberId>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(subscriber.into(), tx);
        rx
    }

    pub fn disconnect(
        &self,
        subscriber: &SubscriberId,
    ) -> bool {
        self.subscribers.remove(subscriber).is_some()
    }

    /// Делает брокер доступным для пересылок по его id.
    pub fn attach(
        &self,
        broker: &Arc<Broker>,
    ) {
        self.brokers
            .insert(broker.id().clone(), Arc::downgrade(broker));
    }

    pub fn detach(
        &self,
        broker: &BrokerId,
    ) -> bool {
        self.brokers.remove(broker).is_some()
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn deliver(
        &self,
        subscriber: &SubscriberId,
        message: Message,
    ) -> Result<(), DeliveryError> {
        // Клонируем Sender, чтобы не держать шард DashMap во время send.
        let tx = self
            .subscribers
            .get(subscriber)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DeliveryError::SubscriberUnreachable(subscriber.to_string()))?;
        tx.send(message)
            .map_err(|_| DeliveryError::SubscriberUnreachable(subscriber.to_string()))
    }

    async fn forward(
        &self,
        peer: &BrokerId,
        message: Message,
    ) -> Result<(), DeliveryError> {
        let broker = self
            .brokers
            .get(peer)
            .and_then(|entry| entry.value().upgrade())
            .ok_or_else(|| DeliveryError::PeerUnreachable(peer.to_string()))?;
        broker
            .accept_message(message)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError::Rejected {
                target: peer.to_string(),
                reason: e.to_string(),
            })
    }
}
