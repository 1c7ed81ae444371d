pub mod broker;
pub mod delivery;
pub mod property;

pub use broker::{BrokerError, BrokerResult};
pub use delivery::DeliveryError;
pub use property::PropertyError;
