use std::{collections::BTreeSet, sync::Arc};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{BrokerId, PropertyBag, PropertyValue};

/// Момент создания сообщения: логическое время и идентификатор того,
/// кто его проставил.
///
/// Проставление можно отложить. Метка считается заданной только когда
/// заполнены оба поля.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    time: Option<u64>,
    stamped_by: Option<String>,
}

impl Timestamp {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn new(
        time: u64,
        stamped_by: impl Into<String>,
    ) -> Self {
        Self {
            time: Some(time),
            stamped_by: Some(stamped_by.into()),
        }
    }

    /// Метка с текущим временем в микросекундах Unix-эпохи.
    pub fn now(stamped_by: impl Into<String>) -> Self {
        let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
        Self::new(micros, stamped_by)
    }

    pub fn with_time(
        mut self,
        time: u64,
    ) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_stamper(
        mut self,
        stamped_by: impl Into<String>,
    ) -> Self {
        self.stamped_by = Some(stamped_by.into());
        self
    }

    pub fn time(&self) -> Option<u64> {
        self.time
    }

    pub fn stamped_by(&self) -> Option<&str> {
        self.stamped_by.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.time.is_some() && self.stamped_by.is_some()
    }
}

/// Неизменяемый конверт сообщения.
///
/// Любая «модификация» ([`with_broker`](Self::with_broker),
/// [`with_topic`](Self::with_topic), [`stamped`](Self::stamped))
/// возвращает новый конверт, поэтому один и тот же экземпляр можно
/// одновременно отдавать в несколько путей доставки и пересылки.
/// Клонирование дешёвое: свойства и набор посещённых брокеров лежат за
/// `Arc`, а payload это `Bytes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Arc<str>,
    timestamp: Timestamp,
    properties: Arc<PropertyBag>,
    payload: Bytes,
    topic: Option<Arc<str>>,
    /// Токен рассылки: один на каждый вызов `publish` и пару (сообщение,
    /// тема). Отличает повторную публикацию от копии той же рассылки.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    route: Option<Arc<str>>,
    visited: Arc<BTreeSet<BrokerId>>,
}

impl Message {
    /// Сообщение со случайным идентификатором и пустыми свойствами.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::builder().payload(payload).build()
    }

    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn id_arc(&self) -> &Arc<str> {
        &self.id
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Тема, на которую помечено сообщение. Задаётся брокером при
    /// пересылке соседу и определяет, куда сообщение попадёт в
    /// `accept_message`.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Брокеры, через которые уже прошёл этот экземпляр сообщения.
    pub fn visited(&self) -> impl Iterator<Item = &BrokerId> {
        self.visited.iter()
    }

    pub fn has_visited(
        &self,
        broker: &BrokerId,
    ) -> bool {
        self.visited.contains(broker)
    }

    /// Новый конверт, в наборе посещённых брокеров которого есть `broker`.
    ///
    /// Набор только растёт. Если брокер уже есть, возвращается равный
    /// конверт.
    pub fn with_broker(
        &self,
        broker: &BrokerId,
    ) -> Message {
        if self.has_visited(broker) {
            return self.clone();
        }
        let mut visited: BTreeSet<BrokerId> = (*self.visited).clone();
        visited.insert(broker.clone());
        Message {
            visited: Arc::new(visited),
            ..self.clone()
        }
    }

    pub fn with_topic(
        &self,
        topic: &str,
    ) -> Message {
        if self.topic() == Some(topic) {
            return self.clone();
        }
        Message {
            topic: Some(Arc::from(topic)),
            ..self.clone()
        }
    }

    /// Токен рассылки, которой принадлежит эта копия. У сообщений,
    /// ещё не прошедших через брокер, его нет.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Ключ для отсечения повторных копий: токен рассылки, а если его
    /// нет, id сообщения.
    pub(crate) fn route_key(&self) -> &Arc<str> {
        self.route.as_ref().unwrap_or(&self.id)
    }

    pub(crate) fn with_route(
        &self,
        route: Arc<str>,
    ) -> Message {
        Message {
            route: Some(route),
            ..self.clone()
        }
    }

    pub fn stamped(
        &self,
        timestamp: Timestamp,
    ) -> Message {
        Message {
            timestamp,
            ..self.clone()
        }
    }
}

/// Builder для [`Message`].
#[derive(Debug, Default)]
pub struct MessageBuilder {
    id: Option<String>,
    timestamp: Timestamp,
    properties: PropertyBag,
    payload: Bytes,
    topic: Option<String>,
}

impl MessageBuilder {
    pub fn id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn timestamp(
        mut self,
        timestamp: Timestamp,
    ) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn property(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.set(name, value);
        self
    }

    pub fn properties(
        mut self,
        properties: PropertyBag,
    ) -> Self {
        self.properties = properties;
        self
    }

    pub fn payload(
        mut self,
        payload: impl Into<Bytes>,
    ) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn topic(
        mut self,
        topic: impl Into<String>,
    ) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn build(self) -> Message {
        let id = self
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Message {
            id: Arc::from(id),
            timestamp: self.timestamp,
            properties: Arc::new(self.properties),
            payload: self.payload,
            topic: self.topic.map(Arc::from),
            route: None,
            visited: Arc::new(BTreeSet::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет создание сообщения через builder со всеми полями.
    #[test]
    fn test_builder_sets_fields() {
        let msg = Message::builder()
            .id("m-1")
            .payload("hello")
            .property("priority", 5i32)
            .topic("news")
            .timestamp(Timestamp::new(10, "publisher"))
            .build();

        assert_eq!(msg.id(), "m-1");
        assert_eq!(msg.payload(), &Bytes::from_static(b"hello"));
        assert_eq!(msg.properties().get::<i32>("priority").unwrap(), 5);
        assert_eq!(msg.topic(), Some("news"));
        assert_eq!(msg.timestamp().time(), Some(10));
        assert_eq!(msg.timestamp().stamped_by(), Some("publisher"));
        assert_eq!(msg.visited().count(), 0);
    }

    /// Тест проверяет, что сообщения без явного id получают разные
    /// идентификаторы.
    #[test]
    fn test_generated_ids_are_unique() {
        let a = Message::new("x");
        let b = Message::new("x");
        assert_ne!(a.id(), b.id());
    }

    /// Тест проверяет, что метка времени не считается заданной, пока
    /// не заполнены оба поля.
    #[test]
    fn test_timestamp_set_only_with_both_fields() {
        assert!(!Timestamp::unset().is_set());
        assert!(!Timestamp::unset().with_time(5).is_set());
        assert!(!Timestamp::unset().with_stamper("b1").is_set());
        assert!(Timestamp::unset().with_time(5).with_stamper("b1").is_set());
        assert!(Timestamp::now("b1").is_set());
    }

    /// Тест проверяет законы `with_broker`: новый брокер виден только в
    /// новом конверте, исходный не меняется, повтор идемпотентен.
    #[test]
    fn test_with_broker_laws() {
        let b1 = BrokerId::new("b1");
        let b2 = BrokerId::new("b2");
        let msg = Message::new("payload");

        let stamped = msg.with_broker(&b1);
        assert!(stamped.has_visited(&b1));
        assert!(!stamped.has_visited(&b2));
        assert_eq!(stamped.with_broker(&b1), stamped);
        assert!(!msg.has_visited(&b1));
        assert_eq!(msg.visited().count(), 0);

        let both = stamped.with_broker(&b2);
        assert_eq!(both.visited().count(), 2);
        assert_eq!(stamped.visited().count(), 1);
    }

    /// Тест проверяет, что `with_topic` и `stamped` не трогают
    /// исходный конверт.
    #[test]
    fn test_with_topic_and_stamped_are_pure() {
        let msg = Message::new("p");
        let tagged = msg.with_topic("news");
        let stamped = msg.stamped(Timestamp::new(1, "b1"));

        assert_eq!(msg.topic(), None);
        assert_eq!(tagged.topic(), Some("news"));
        assert_eq!(tagged.id(), msg.id());
        assert!(!msg.timestamp().is_set());
        assert!(stamped.timestamp().is_set());
    }

    /// Тест проверяет, что ключ повтора берётся из токена рассылки, а
    /// без него из id.
    #[test]
    fn test_route_key_prefers_route() {
        let msg = Message::builder().id("m-7").build();
        assert_eq!(msg.route(), None);
        assert_eq!(&**msg.route_key(), "m-7");

        let routed = msg.with_route(Arc::from("r-1"));
        assert_eq!(routed.route(), Some("r-1"));
        assert_eq!(&**routed.route_key(), "r-1");
        assert_eq!(routed.id(), "m-7");
        assert_eq!(msg.route(), None);
    }
}
