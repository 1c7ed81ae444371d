use thiserror::Error;

use crate::pubsub::PropertyKind;

/// Ошибка чтения свойства из [`PropertyBag`](crate::PropertyBag).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("property not found: {0}")]
    NotFound(String),

    #[error("property `{name}` holds {actual}, requested {expected}")]
    TypeMismatch {
        name: String,
        expected: PropertyKind,
        actual: PropertyKind,
    },
}
