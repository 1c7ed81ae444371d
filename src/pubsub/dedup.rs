use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;

type SeenKey = (Arc<str>, Arc<str>);

/// Ограниченный кэш уже маршрутизированных пар (токен рассылки, тема).
///
/// Набор посещённых брокеров гарантирует конечность рассылки, но в сети
/// с несколькими путями одно сообщение может прийти к брокеру дважды.
/// Кэш отсекает повторные копии.
pub(crate) struct SeenCache {
    inner: Mutex<LruCache<SeenKey, ()>>,
}

impl SeenCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Запоминает пару. Возвращает `false`, если она уже была.
    pub(crate) fn first_sighting(
        &self,
        id: &Arc<str>,
        topic: &Arc<str>,
    ) -> bool {
        let key = (id.clone(), topic.clone());
        let mut cache = self.inner.lock();
        if cache.get(&key).is_some() {
            return false;
        }
        cache.put(key, ());
        true
    }

    #[cfg(test)]
    pub(crate) fn record(
        &self,
        id: &Arc<str>,
        topic: &Arc<str>,
    ) {
        self.inner.lock().put((id.clone(), topic.clone()), ());
    }

    /// Забывает все пары с темой `topic`.
    pub(crate) fn forget_topic(
        &self,
        topic: &str,
    ) {
        let mut cache = self.inner.lock();
        let stale: Vec<SeenKey> = cache
            .iter()
            .filter(|(key, _)| &*key.1 == topic)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            cache.pop(key);
        }
    }
}
