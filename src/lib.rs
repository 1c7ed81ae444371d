/// Broker process settings (environment-driven).
pub mod config;
/// Error types: topic/subscription management, property access, delivery.
pub mod error;
/// Logging initialisation (console and file sinks, env filter).
pub mod logging;
/// Pub/Sub core: messages, topics, routing and mesh flooding.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::BrokerSettings;
/// Operation errors and result types.
pub use error::{BrokerError, BrokerResult, DeliveryError, PropertyError};
/// Logging.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{
    filter, Broker, BrokerConfig, BrokerId, BrokerStats, DeliveryFailure, DeliveryTarget, Filter,
    InProcessTransport, Message, MessageBuilder, MessageFilter, PropertyBag, PropertyKind,
    PropertyType, PropertyValue, PublishReport, SubscriberId, Subscription, Timestamp, Topic,
    TopicRegistry, Transport,
};
