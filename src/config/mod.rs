pub mod settings;

pub use settings::BrokerSettings;
