use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;

use super::Topic;
use crate::{BrokerError, BrokerResult};

/// Реестр тем брокера: имя → [`Topic`].
///
/// Единственное общее изменяемое состояние уровня брокера. Все изменения
/// выполняются под одной блокировкой на запись, поэтому читатель никогда
/// не увидит частично применённую операцию.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<Arc<str>, Arc<Topic>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_topic(
        &self,
        name: &str,
    ) -> BrokerResult<Arc<Topic>> {
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(BrokerError::TopicAlreadyExists(name.to_owned()));
        }
        let key: Arc<str> = Arc::from(name);
        let topic = Arc::new(Topic::new(key.clone()));
        topics.insert(key, topic.clone());
        Ok(topic)
    }

    /// Создаёт все темы или ни одной.
    ///
    /// Если хотя бы одно имя уже занято (или повторяется внутри пакета),
    /// возвращается `TopicAlreadyExists` с этим именем и реестр не
    /// меняется.
    pub fn create_topics<I, S>(
        &self,
        names: I,
    ) -> BrokerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        let mut topics = self.topics.write();

        let mut batch = HashSet::with_capacity(names.len());
        for name in &names {
            let name = name.as_ref();
            if topics.contains_key(name) || !batch.insert(name) {
                return Err(BrokerError::TopicAlreadyExists(name.to_owned()));
            }
        }

        for name in &names {
            let key: Arc<str> = Arc::from(name.as_ref());
            topics.insert(key.clone(), Arc::new(Topic::new(key)));
        }
        Ok(())
    }

    /// Удаляет тему вместе со всеми подписками.
    pub fn destroy_topic(
        &self,
        name: &str,
    ) -> BrokerResult<()> {
        let removed = self
            .topics
            .write()
            .remove(name)
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_owned()))?;
        // Рассылки, уже взявшие снимок, дорабатывают; новые подписки через
        // старый Arc никуда не попадут.
        removed.clear();
        Ok(())
    }

    pub fn is_topic(
        &self,
        name: &str,
    ) -> bool {
        self.topics.read().contains_key(name)
    }

    pub fn get(
        &self,
        name: &str,
    ) -> BrokerResult<Arc<Topic>> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_owned()))
    }

    /// Разрешает все имена под одной блокировкой на чтение.
    ///
    /// Первое отсутствующее имя прерывает операцию целиком.
    pub fn resolve<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> BrokerResult<Vec<Arc<Topic>>> {
        let topics = self.topics.read();
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                topics
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BrokerError::TopicNotFound(name.to_owned()))
            })
            .collect()
    }

    /// Снимок имён тем.
    pub fn topic_names(&self) -> BTreeSet<String> {
        self.topics.read().keys().map(|k| k.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubscriberId;

    #[test]
    fn test_create_and_query() {
        let registry = TopicRegistry::new();
        registry.create_topic("news").unwrap();

        assert!(registry.is_topic("news"));
        assert!(!registry.is_topic("sport"));
        assert_eq!(
            registry.create_topic("news").unwrap_err(),
            BrokerError::TopicAlreadyExists("news".into())
        );
        assert_eq!(registry.len(), 1);
    }

    /// Тест проверяет, что пакетное создание атомарно: при конфликте
    /// не создаётся ни одна тема.
    #[test]
    fn test_create_topics_all_or_nothing() {
        let registry = TopicRegistry::new();
        registry.create_topic("a").unwrap();

        let err = registry.create_topics(["a", "b"]).unwrap_err();
        assert_eq!(err, BrokerError::TopicAlreadyExists("a".into()));
        assert!(!registry.is_topic("b"));

        let err = registry.create_topics(["c", "c"]).unwrap_err();
        assert_eq!(err, BrokerError::TopicAlreadyExists("c".into()));
        assert!(!registry.is_topic("c"));

        registry.create_topics(vec!["b".to_string(), "c".into()]).unwrap();
        assert_eq!(
            registry.topic_names(),
            BTreeSet::from(["a".to_string(), "b".into(), "c".into()])
        );
    }

    /// Тест проверяет, что удаление темы снимает её подписки.
    #[test]
    fn test_destroy_clears_subscriptions() {
        let registry = TopicRegistry::new();
        let topic = registry.create_topic("news").unwrap();
        topic.subscribe(SubscriberId::new("A"), None);

        registry.destroy_topic("news").unwrap();

        assert!(!registry.is_topic("news"));
        assert_eq!(topic.subscriber_count(), 0);
        assert_eq!(
            registry.destroy_topic("news").unwrap_err(),
            BrokerError::TopicNotFound("news".into())
        );
    }

    /// Тест проверяет, что снимок имён не меняется задним числом.
    #[test]
    fn test_topic_names_snapshot() {
        let registry = TopicRegistry::new();
        registry.create_topic("a").unwrap();
        let names = registry.topic_names();
        registry.create_topic("b").unwrap();
        registry.destroy_topic("a").unwrap();

        assert_eq!(names, BTreeSet::from(["a".to_string()]));
    }

    /// Тест проверяет, что из двух параллельных пересекающихся пакетов
    /// создаётся ровно один и целиком.
    #[test]
    fn test_concurrent_overlapping_batches() {
        for _ in 0..100 {
            let registry = TopicRegistry::new();
            let (left, right) = std::thread::scope(|scope| {
                let left = scope.spawn(|| registry.create_topics(["a", "shared"]));
                let right = scope.spawn(|| registry.create_topics(["shared", "b"]));
                (left.join().unwrap(), right.join().unwrap())
            });

            assert!(left.is_ok() != right.is_ok());
            let expected = if left.is_ok() { ["a", "shared"] } else { ["b", "shared"] };
            assert_eq!(
                registry.topic_names(),
                expected.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
            );
        }
    }

    #[test]
    fn test_resolve_fails_on_first_missing() {
        let registry = TopicRegistry::new();
        registry.create_topics(["a", "b"]).unwrap();

        assert_eq!(registry.resolve(&["a", "b"]).unwrap().len(), 2);
        assert_eq!(
            registry.resolve(&["a", "x", "b"]).unwrap_err(),
            BrokerError::TopicNotFound("x".into())
        );
    }
}
