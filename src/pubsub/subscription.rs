use std::fmt;

use super::{Filter, Message, SubscriberId};

/// Регистрация подписчика на теме с необязательным фильтром.
///
/// Без фильтра подписчик получает все сообщения темы.
#[derive(Clone)]
pub struct Subscription {
    subscriber: SubscriberId,
    filter: Option<Filter>,
}

impl Subscription {
    pub fn new(
        subscriber: SubscriberId,
        filter: Option<Filter>,
    ) -> Self {
        Self { subscriber, filter }
    }

    pub fn subscriber(&self) -> &SubscriberId {
        &self.subscriber
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Проверяет, должен ли подписчик получить сообщение.
    pub fn accepts(
        &self,
        message: &Message,
    ) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(message))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
