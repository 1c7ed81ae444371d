use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::PropertyError;

/// Вид значения, хранимого в [`PropertyBag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
}

impl fmt::Display for PropertyKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            PropertyKind::Bool => "bool",
            PropertyKind::Byte => "byte",
            PropertyKind::Char => "char",
            PropertyKind::Short => "short",
            PropertyKind::Int => "int",
            PropertyKind::Long => "long",
            PropertyKind::Float => "float",
            PropertyKind::Double => "double",
            PropertyKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Типизированное значение свойства сообщения.
///
/// Набор видов закрыт: имя свойства всегда указывает ровно на одно
/// значение одного вида.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Byte(u8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Text(String),
}

impl PropertyValue {
    /// Возвращает вид хранимого значения.
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Byte(_) => PropertyKind::Byte,
            PropertyValue::Char(_) => PropertyKind::Char,
            PropertyValue::Short(_) => PropertyKind::Short,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Long(_) => PropertyKind::Long,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::Text(_) => PropertyKind::Text,
        }
    }
}

/// Rust-тип, который можно прочитать из [`PropertyBag`] через
/// [`PropertyBag::get`].
pub trait PropertyType: Sized {
    const KIND: PropertyKind;

    fn from_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! copy_property_type {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for PropertyValue {
            fn from(value: $ty) -> Self {
                PropertyValue::$variant(value)
            }
        }

        impl PropertyType for $ty {
            const KIND: PropertyKind = PropertyKind::$variant;

            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

copy_property_type!(bool, Bool);
copy_property_type!(u8, Byte);
copy_property_type!(char, Char);
copy_property_type!(i16, Short);
copy_property_type!(i32, Int);
copy_property_type!(i64, Long);
copy_property_type!(f32, Float);
copy_property_type!(f64, Double);

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_owned())
    }
}

impl PropertyType for String {
    const KIND: PropertyKind = PropertyKind::Text;

    fn from_value(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Именованные типизированные атрибуты сообщения.
///
/// Повторный `set` под тем же именем заменяет и вид, и значение.
/// Два набора равны, если у них одинаковые имена и каждое имя указывает
/// на равные пары (вид, значение).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: HashMap<String, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Записывает значение и возвращает предыдущее, если оно было.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.entries.insert(name.into(), value.into())
    }

    /// То же, что [`set`](Self::set), но в стиле builder.
    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.set(name, value);
        self
    }

    /// Читает значение как тип `T`.
    ///
    /// # Ошибки
    /// - [`PropertyError::NotFound`], если имя не задано;
    /// - [`PropertyError::TypeMismatch`], если хранится значение другого вида.
    pub fn get<T: PropertyType>(
        &self,
        name: &str,
    ) -> Result<T, PropertyError> {
        let value = self
            .entries
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_owned()))?;
        T::from_value(value).ok_or_else(|| PropertyError::TypeMismatch {
            name: name.to_owned(),
            expected: T::KIND,
            actual: value.kind(),
        })
    }

    /// Читает текстовое свойство без копирования.
    pub fn get_str(
        &self,
        name: &str,
    ) -> Result<&str, PropertyError> {
        match self.entries.get(name) {
            Some(PropertyValue::Text(s)) => Ok(s),
            Some(other) => Err(PropertyError::TypeMismatch {
                name: name.to_owned(),
                expected: PropertyKind::Text,
                actual: other.kind(),
            }),
            None => Err(PropertyError::NotFound(name.to_owned())),
        }
    }

    /// Возвращает сырое значение, не проверяя вид.
    pub fn value(
        &self,
        name: &str,
    ) -> Option<&PropertyValue> {
        self.entries.get(name)
    }

    pub fn contains(
        &self,
        name: &str,
    ) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
