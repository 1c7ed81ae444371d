use std::{
    collections::{BTreeSet, HashMap, HashSet},
    ops::AddAssign,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{
    dedup::SeenCache, BrokerId, Filter, Message, SubscriberId, Topic, TopicRegistry, Transport,
};
use crate::{BrokerError, BrokerResult, DeliveryError};

/// Параметры брокера.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub id: BrokerId,
    /// Сколько пар (id сообщения, тема) помнить для отсечения дублей.
    pub dedup_capacity: usize,
    /// Ёмкость broadcast-канала отказов доставки.
    pub failure_channel_capacity: usize,
}

impl BrokerConfig {
    pub fn with_id(id: impl Into<BrokerId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            id: BrokerId::random(),
            dedup_capacity: 4096,
            failure_channel_capacity: 256,
        }
    }
}

/// Куда не удалось доставить сообщение.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    Subscriber(SubscriberId),
    Peer(BrokerId),
}

/// Событие отказа доставки для операторского канала.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub broker: BrokerId,
    pub target: DeliveryTarget,
    pub message_id: String,
    pub error: DeliveryError,
}

/// Сколько единиц работы запустил один вызов публикации.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Доставок локальным подписчикам.
    pub deliveries: usize,
    /// Пересылок соседним брокерам.
    pub forwards: usize,
}

impl AddAssign for PublishReport {
    fn add_assign(
        &mut self,
        rhs: Self,
    ) {
        self.deliveries += rhs.deliveries;
        self.forwards += rhs.forwards;
    }
}

/// Снимок счётчиков брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Сообщений, опубликованных локально.
    pub published: u64,
    /// Сообщений, принятых от соседей и маршрутизированных.
    pub accepted: u64,
    /// Успешных доставок подписчикам.
    pub delivered: u64,
    /// Успешных пересылок соседям.
    pub forwarded: u64,
    /// Отброшенных повторных копий.
    pub duplicates: u64,
    /// Отказов доставки или пересылки.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    accepted: AtomicU64,
    delivered: AtomicU64,
    forwarded: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
}

/// На какие темы сосед получает пересылки.
#[derive(Debug, Clone)]
enum PeerScope {
    All,
    Topics(HashSet<String>),
}

impl PeerScope {
    fn covers(
        &self,
        topic: &str,
    ) -> bool {
        match self {
            PeerScope::All => true,
            PeerScope::Topics(topics) => topics.contains(topic),
        }
    }
}

/// Отчёт об отказах: лог, счётчик и операторский канал.
#[derive(Clone)]
struct FailureReporter {
    broker: BrokerId,
    counters: Arc<Counters>,
    failures: broadcast::Sender<DeliveryFailure>,
}

impl FailureReporter {
    fn report(
        &self,
        target: DeliveryTarget,
        message_id: &str,
        error: DeliveryError,
    ) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            broker = %self.broker,
            target = ?target,
            message_id,
            error = %error,
            "delivery failed"
        );
        // Нет слушателей: не ошибка.
        let _ = self.failures.send(DeliveryFailure {
            broker: self.broker.clone(),
            target,
            message_id: message_id.to_owned(),
            error,
        });
    }
}

/// Брокер Pub/Sub с поддержкой mesh-сети.
///
/// Публикация разрешает темы в реестре, проверяет фильтры подписок и
/// отдаёт сообщение подписчикам через [`Transport`]. Параллельно
/// сообщение, помеченное этим брокером, уходит соседям, которые его ещё
/// не видели. Каждая доставка и пересылка запускается отдельной задачей
/// tokio и не ждёт остальных.
///
/// Методы `publish*` и `accept_message*` должны вызываться внутри
/// runtime tokio.
pub struct Broker {
    id: BrokerId,
    registry: TopicRegistry,
    peers: RwLock<HashMap<BrokerId, PeerScope>>,
    transport: Arc<dyn Transport>,
    seen: SeenCache,
    counters: Arc<Counters>,
    failures: broadcast::Sender<DeliveryFailure>,
}

impl Broker {
    pub fn new(
        id: impl Into<BrokerId>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::with_config(BrokerConfig::with_id(id), transport)
    }

    pub fn with_config(
        config: BrokerConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (failures, _) = broadcast::channel(config.failure_channel_capacity.max(1));
        Self {
            id: config.id,
            registry: TopicRegistry::new(),
            peers: RwLock::new(HashMap::new()),
            transport,
            seen: SeenCache::new(config.dedup_capacity),
            counters: Arc::new(Counters::default()),
            failures,
        }
    }

    pub fn id(&self) -> &BrokerId {
        &self.id
    }

    // ---------------------------------------------------------------------
    //  Темы
    // ---------------------------------------------------------------------

    pub fn create_topic(
        &self,
        name: &str,
    ) -> BrokerResult<()> {
        self.registry.create_topic(name)?;
        info!(broker = %self.id, topic = name, "topic created");
        Ok(())
    }

    /// Создаёт все темы или ни одной (см. [`TopicRegistry::create_topics`]).
    pub fn create_topics<I, S>(
        &self,
        names: I,
    ) -> BrokerResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<S> = names.into_iter().collect();
        self.registry.create_topics(&names)?;
        info!(broker = %self.id, count = names.len(), "topics created");
        Ok(())
    }

    pub fn destroy_topic(
        &self,
        name: &str,
    ) -> BrokerResult<()> {
        self.registry.destroy_topic(name)?;
        // Тема, созданная заново под тем же именем, начинает с чистого
        // кэша повторов.
        self.seen.forget_topic(name);
        info!(broker = %self.id, topic = name, "topic destroyed");
        Ok(())
    }

    pub fn is_topic(
        &self,
        name: &str,
    ) -> bool {
        self.registry.is_topic(name)
    }

    /// Снимок имён тем.
    pub fn topics(&self) -> BTreeSet<String> {
        self.registry.topic_names()
    }

    // ---------------------------------------------------------------------
    //  Подписки
    // ---------------------------------------------------------------------

    /// Подписка без фильтра: подписчик получит все сообщения темы.
    pub fn subscribe(
        &self,
        topic: &str,
        subscriber: impl Into<SubscriberId>,
    ) -> BrokerResult<()> {
        self.subscribe_inner(topic, subscriber.into(), None)
    }

    /// Подписка с фильтром. Повторный вызов для той же пары заменяет
    /// фильтр.
    pub fn subscribe_with_filter(
        &self,
        topic: &str,
        subscriber: impl Into<SubscriberId>,
        filter: Filter,
    ) -> BrokerResult<()> {
        self.subscribe_inner(topic, subscriber.into(), Some(filter))
    }

    /// Подписывает одного подписчика на несколько тем без фильтра.
    ///
    /// Каждое имя обрабатывается независимо: результат `i` относится к
    /// `topics[i]`, неудача одной темы не откатывает остальные.
    pub fn subscribe_topics<I, S>(
        &self,
        topics: I,
        subscriber: impl Into<SubscriberId>,
    ) -> Vec<BrokerResult<()>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let subscriber = subscriber.into();
        topics
            .into_iter()
            .map(|topic| self.subscribe_inner(topic.as_ref(), subscriber.clone(), None))
            .collect()
    }

    fn subscribe_inner(
        &self,
        topic: &str,
        subscriber: SubscriberId,
        filter: Option<Filter>,
    ) -> BrokerResult<()> {
        let filtered = filter.is_some();
        let replaced = self.registry.get(topic)?.subscribe(subscriber.clone(), filter);
        debug!(
            broker = %self.id,
            topic,
            subscriber = %subscriber,
            filtered,
            replaced,
            "subscribed"
        );
        Ok(())
    }

    /// Заменяет фильтр существующей подписки; `None` снимает фильтр.
    ///
    /// Публикации, уже взявшие снимок подписок, работают со старым
    /// фильтром.
    pub fn modify_filter(
        &self,
        topic: &str,
        subscriber: &SubscriberId,
        filter: Option<Filter>,
    ) -> BrokerResult<()> {
        self.registry.get(topic)?.modify_filter(subscriber, filter)
    }

    /// Отписка. Отписка отсутствующего подписчика ничего не делает.
    pub fn unsubscribe(
        &self,
        topic: &str,
        subscriber: &SubscriberId,
    ) -> BrokerResult<()> {
        let removed = self.registry.get(topic)?.unsubscribe(subscriber);
        debug!(broker = %self.id, topic, subscriber = %subscriber, removed, "unsubscribed");
        Ok(())
    }

    pub fn subscribers(
        &self,
        topic: &str,
    ) -> BrokerResult<Vec<SubscriberId>> {
        Ok(self.registry.get(topic)?.subscribers())
    }

    // ---------------------------------------------------------------------
    //  Соседи
    // ---------------------------------------------------------------------

    /// Связывает брокер с соседом для всех тем.
    pub fn link_peer(
        &self,
        peer: impl Into<BrokerId>,
    ) {
        self.peers.write().insert(peer.into(), PeerScope::All);
    }

    /// Связывает брокер с соседом только для перечисленных тем.
    pub fn link_peer_for<I, S>(
        &self,
        peer: impl Into<BrokerId>,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scope = PeerScope::Topics(topics.into_iter().map(Into::into).collect());
        self.peers.write().insert(peer.into(), scope);
    }

    pub fn unlink_peer(
        &self,
        peer: &BrokerId,
    ) -> bool {
        self.peers.write().remove(peer).is_some()
    }

    /// Снимок соседей в отсортированном порядке.
    pub fn peers(&self) -> Vec<BrokerId> {
        let mut peers: Vec<_> = self.peers.read().keys().cloned().collect();
        peers.sort();
        peers
    }

    fn peers_for(
        &self,
        topic: &str,
    ) -> Vec<BrokerId> {
        self.peers
            .read()
            .iter()
            .filter(|(_, scope)| scope.covers(topic))
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    // ---------------------------------------------------------------------
    //  Публикация
    // ---------------------------------------------------------------------

    /// Публикует одно сообщение в одну тему.
    pub async fn publish(
        &self,
        message: Message,
        topic: &str,
    ) -> BrokerResult<PublishReport> {
        self.publish_all(vec![message], &[topic]).await
    }

    /// Публикует одно сообщение в несколько тем.
    pub async fn publish_to<S: AsRef<str>>(
        &self,
        message: Message,
        topics: &[S],
    ) -> BrokerResult<PublishReport> {
        self.publish_all(vec![message], topics).await
    }

    /// Публикует несколько сообщений в одну тему.
    pub async fn publish_batch(
        &self,
        messages: Vec<Message>,
        topic: &str,
    ) -> BrokerResult<PublishReport> {
        self.publish_all(messages, &[topic]).await
    }

    /// Публикует каждое сообщение в каждую тему.
    ///
    /// Все темы разрешаются до начала рассылки: если хотя бы одной нет,
    /// возвращается `TopicNotFound` и никто ничего не получает. Пары
    /// (сообщение, тема) между собой не атомарны.
    pub async fn publish_all<S: AsRef<str>>(
        &self,
        messages: Vec<Message>,
        topics: &[S],
    ) -> BrokerResult<PublishReport> {
        let resolved = self.registry.resolve(topics)?;
        let mut report = PublishReport::default();
        for message in &messages {
            self.counters.published.fetch_add(1, Ordering::Relaxed);
            for topic in &resolved {
                // Каждая публикация это отдельная рассылка, даже если
                // сообщение уже публиковалось.
                let route: Arc<str> = Arc::from(uuid::Uuid::new_v4().to_string());
                report += self.route(message, topic, Some(route));
            }
        }
        Ok(report)
    }

    /// Приём сообщения от соседа или транспорта.
    ///
    /// Сообщение продолжает рассылку по теме, которой оно помечено, с уже
    /// накопленным набором посещённых брокеров. Копии, которые этот
    /// брокер уже видел, отбрасываются и дают пустой отчёт.
    pub async fn accept_message(
        &self,
        message: Message,
    ) -> BrokerResult<PublishReport> {
        let topic_name = message
            .topic()
            .ok_or_else(|| BrokerError::UntaggedMessage(message.id().to_owned()))?;

        if message.has_visited(&self.id) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(broker = %self.id, message_id = message.id(), "already visited, dropped");
            return Ok(PublishReport::default());
        }

        let topic = self.registry.get(topic_name)?;
        if !self.seen.first_sighting(message.route_key(), topic.name_arc()) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            debug!(
                broker = %self.id,
                message_id = message.id(),
                topic = topic_name,
                "duplicate copy dropped"
            );
            return Ok(PublishReport::default());
        }

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(self.route(&message, &topic, None))
    }

    /// Принимает несколько сообщений; результат `i` относится к
    /// `messages[i]`.
    pub async fn accept_messages(
        &self,
        messages: Vec<Message>,
    ) -> Vec<BrokerResult<PublishReport>> {
        let mut results = Vec::with_capacity(messages.len());
        for message in messages {
            results.push(self.accept_message(message).await);
        }
        results
    }

    /// Рассылка одной пары (сообщение, тема).
    ///
    /// Подписчики получают `message` как есть. Соседям уходит копия с
    /// меткой темы и этим брокером в наборе посещённых; `route` задаёт
    /// новый токен рассылки, `None` сохраняет токен входящей копии.
    fn route(
        &self,
        message: &Message,
        topic: &Topic,
        route: Option<Arc<str>>,
    ) -> PublishReport {
        let mut report = PublishReport::default();

        for subscription in topic.snapshot() {
            if !subscription.accepts(message) {
                continue;
            }
            self.spawn_delivery(subscription.subscriber().clone(), message.clone());
            report.deliveries += 1;
        }

        let mut outbound = message.with_topic(topic.name()).with_broker(&self.id);
        if let Some(route) = route {
            outbound = outbound.with_route(route);
        }
        for peer in self.peers_for(topic.name()) {
            if message.has_visited(&peer) {
                debug!(
                    broker = %self.id,
                    peer = %peer,
                    message_id = message.id(),
                    "peer already visited, not forwarding"
                );
                continue;
            }
            self.spawn_forward(peer, outbound.clone());
            report.forwards += 1;
        }

        debug!(
            broker = %self.id,
            topic = topic.name(),
            message_id = message.id(),
            deliveries = report.deliveries,
            forwards = report.forwards,
            "routed"
        );
        report
    }

    fn spawn_delivery(
        &self,
        subscriber: SubscriberId,
        message: Message,
    ) {
        let transport = Arc::clone(&self.transport);
        let reporter = self.reporter();
        tokio::spawn(async move {
            let message_id = message.id_arc().clone();
            match transport.deliver(&subscriber, message).await {
                Ok(()) => {
                    reporter.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    reporter.report(DeliveryTarget::Subscriber(subscriber), &message_id, e)
                }
            }
        });
    }

    fn spawn_forward(
        &self,
        peer: BrokerId,
        message: Message,
    ) {
        let transport = Arc::clone(&self.transport);
        let reporter = self.reporter();
        tokio::spawn(async move {
            let message_id = message.id_arc().clone();
            match transport.forward(&peer, message).await {
                Ok(()) => {
                    reporter.counters.forwarded.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => reporter.report(DeliveryTarget::Peer(peer), &message_id, e),
            }
        });
    }

    fn reporter(&self) -> FailureReporter {
        FailureReporter {
            broker: self.id.clone(),
            counters: Arc::clone(&self.counters),
            failures: self.failures.clone(),
        }
    }

    // ---------------------------------------------------------------------
    //  Наблюдаемость
    // ---------------------------------------------------------------------

    /// Подписка на операторский канал отказов доставки.
    pub fn failures(&self) -> broadcast::Receiver<DeliveryFailure> {
        self.failures.subscribe()
    }

    pub fn stats(&self) -> BrokerStats {
        let c = &self.counters;
        BrokerStats {
            published: c.published.load(Ordering::Relaxed),
            accepted: c.accepted.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            forwarded: c.forwarded.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("id", &self.id)
            .field("topics", &self.registry.len())
            .field("peers", &self.peers.read().len())
            .finish()
    }
}
