use thiserror::Error;

/// Ошибка транспорта при доставке подписчику или пересылке соседнему
/// брокеру.
///
/// Не возвращается из `publish`: попадает в лог и в канал отказов брокера.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("subscriber unreachable: {0}")]
    SubscriberUnreachable(String),

    #[error("peer broker unreachable: {0}")]
    PeerUnreachable(String),

    #[error("{target} rejected message: {reason}")]
    Rejected { target: String, reason: String },
}
