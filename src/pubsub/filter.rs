//! Фильтры подписок: предикаты над [`Message`].
//!
//! Любое замыкание `Fn(&Message) -> bool + Send + Sync` уже является
//! фильтром. Функции этого модуля собирают типовые фильтры и комбинируют
//! их.

use std::sync::Arc;

use super::{Message, PropertyValue};

/// Предикат, решающий, получит ли подписчик сообщение.
///
/// Ожидается чистая функция: брокер вызывает её конкурентно из разных
/// публикаций.
pub trait MessageFilter: Send + Sync {
    fn matches(
        &self,
        message: &Message,
    ) -> bool;
}

impl<F> MessageFilter for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn matches(
        &self,
        message: &Message,
    ) -> bool {
        self(message)
    }
}

/// Разделяемый фильтр, хранимый в подписке.
pub type Filter = Arc<dyn MessageFilter>;

pub fn from_fn<F>(f: F) -> Filter
where
    F: Fn(&Message) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Пропускает сообщения с payload длиннее `len` байт.
pub fn payload_len_greater_than(len: usize) -> Filter {
    from_fn(move |m| m.payload().len() > len)
}

pub fn has_property(name: impl Into<String>) -> Filter {
    let name = name.into();
    from_fn(move |m| m.properties().contains(&name))
}

/// Пропускает сообщения, у которых свойство `name` равно `value` и
/// того же вида.
pub fn property_equals(
    name: impl Into<String>,
    value: impl Into<PropertyValue>,
) -> Filter {
    let name = name.into();
    let value = value.into();
    from_fn(move |m| m.properties().value(&name) == Some(&value))
}

pub fn and(
    left: Filter,
    right: Filter,
) -> Filter {
    from_fn(move |m| left.matches(m) && right.matches(m))
}

pub fn or(
    left: Filter,
    right: Filter,
) -> Filter {
    from_fn(move |m| left.matches(m) || right.matches(m))
}

pub fn not(inner: Filter) -> Filter {
    from_fn(move |m| !inner.matches(m))
}
