use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::{logging::LogFormat, BrokerConfig, BrokerId, LoggingConfig};

/// Настройки процесса брокера.
///
/// Источники по возрастанию приоритета: значения по умолчанию,
/// переменные окружения с префиксом `BROKERMESH_`
/// (например `BROKERMESH_DEDUP_CAPACITY=1024`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Идентификатор брокера; если не задан, генерируется UUID.
    pub broker_id: Option<String>,
    pub dedup_capacity: usize,
    pub failure_channel_capacity: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            broker_id: None,
            dedup_capacity: 4096,
            failure_channel_capacity: 256,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl BrokerSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            // Значения по умолчанию
            .set_default("dedup_capacity", 4096)?
            .set_default("failure_channel_capacity", 256)?
            .set_default("log_level", "info")?
            .set_default("log_format", "compact")?
            // Переменные окружения с префиксом BROKERMESH_
            .add_source(Environment::with_prefix("BROKERMESH").try_parsing(true))
            .build()?;

        let settings: Self = cfg.try_deserialize()?;
        if settings.dedup_capacity == 0 {
            return Err(ConfigError::Message(
                "dedup_capacity must be greater than zero".into(),
            ));
        }
        Ok(settings)
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            id: self
                .broker_id
                .as_deref()
                .map(BrokerId::new)
                .unwrap_or_else(BrokerId::random),
            dedup_capacity: self.dedup_capacity,
            failure_channel_capacity: self.failure_channel_capacity,
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            ..LoggingConfig::default()
        }
    }
}
