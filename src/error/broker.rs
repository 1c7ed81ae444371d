use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

/// Ошибки управления темами, подписками и публикации.
///
/// Все варианты относятся только к одному запросу и никогда не
/// переводят брокер в нерабочее состояние.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("topic already exists: {0}")]
    TopicAlreadyExists(String),

    #[error("topic not found: {0}")]
    TopicNotFound(String),

    #[error("subscriber `{subscriber}` is not subscribed to topic `{topic}`")]
    SubscriberNotFound { topic: String, subscriber: String },

    #[error("inbound message {0} carries no topic tag")]
    UntaggedMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_display() {
        assert_eq!(
            BrokerError::TopicNotFound("news".into()).to_string(),
            "topic not found: news"
        );
        assert_eq!(
            BrokerError::SubscriberNotFound {
                topic: "news".into(),
                subscriber: "A".into(),
            }
            .to_string(),
            "subscriber `A` is not subscribed to topic `news`"
        );
    }
}
