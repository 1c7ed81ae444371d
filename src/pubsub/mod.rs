//! Ядро Publish–Subscribe брокера.
//!
//! - `property`: типизированные свойства сообщения.
//! - `id`: идентификаторы брокеров и подписчиков.
//! - `message`: неизменяемый конверт сообщения с набором посещённых
//!   брокеров.
//! - `filter`: фильтры подписок.
//! - `subscription`, `topic`, `registry`: подписки, темы и реестр тем.
//! - `transport`: граница с внешним транспортом и реализация внутри
//!   процесса.
//! - `broker`: маршрутизация публикаций и рассылка по mesh-сети.
//! - `dedup` (приватный): кэш уже маршрутизированных сообщений.

pub mod broker;
mod dedup;
pub mod filter;
pub mod id;
pub mod message;
pub mod property;
pub mod registry;
pub mod subscription;
pub mod topic;
pub mod transport;

pub use broker::*;
pub use filter::{Filter, MessageFilter};
pub use id::*;
pub use message::*;
pub use property::*;
pub use registry::*;
pub use subscription::*;
pub use topic::*;
pub use transport::*;
