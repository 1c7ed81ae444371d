use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use super::{Filter, SubscriberId, Subscription};
use crate::{BrokerError, BrokerResult};

/// Именованный канал и его подписки.
///
/// Карта подписок защищена собственным `RwLock`: изменения подписок одной
/// темы не блокируют другие темы, а публикация берёт снимок под
/// блокировкой на чтение и рассылает уже без неё.
#[derive(Debug)]
pub struct Topic {
    name: Arc<str>,
    subscriptions: RwLock<HashMap<SubscriberId, Subscription>>,
}

impl Topic {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self {
            name,
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Добавляет подписку или заменяет фильтр существующей.
    ///
    /// Возвращает `true`, если подписка была заменена.
    pub fn subscribe(
        &self,
        subscriber: SubscriberId,
        filter: Option<Filter>,
    ) -> bool {
        let subscription = Subscription::new(subscriber.clone(), filter);
        self.subscriptions
            .write()
            .insert(subscriber, subscription)
            .is_some()
    }

    /// Заменяет фильтр у уже подписанного подписчика.
    pub fn modify_filter(
        &self,
        subscriber: &SubscriberId,
        filter: Option<Filter>,
    ) -> BrokerResult<()> {
        let mut subscriptions = self.subscriptions.write();
        match subscriptions.get_mut(subscriber) {
            Some(existing) => {
                *existing = Subscription::new(subscriber.clone(), filter);
                Ok(())
            }
            None => Err(BrokerError::SubscriberNotFound {
                topic: self.name.to_string(),
                subscriber: subscriber.to_string(),
            }),
        }
    }

    /// Удаляет подписку. Возвращает `false`, если подписки не было.
    pub fn unsubscribe(
        &self,
        subscriber: &SubscriberId,
    ) -> bool {
        self.subscriptions.write().remove(subscriber).is_some()
    }

    pub fn is_subscribed(
        &self,
        subscriber: &SubscriberId,
    ) -> bool {
        self.subscriptions.read().contains_key(subscriber)
    }

    /// Снимок текущих подписок для одной рассылки.
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.subscriptions.read().values().cloned().collect()
    }

    /// Подписчики темы в отсортированном порядке.
    pub fn subscribers(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<_> = self.subscriptions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub(crate) fn clear(&self) {
        self.subscriptions.write().clear();
    }
}
