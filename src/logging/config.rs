use std::{env, fmt, io, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Формат вывода в консоль.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingConfigError::InvalidFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LoggingConfigError {
    #[error("invalid log level or filter directive: {0}")]
    InvalidLevel(String),

    #[error("unknown log format `{0}` (expected compact, pretty or json)")]
    InvalidFormat(String),

    #[error("cannot create log directory: {0}")]
    LogDir(#[from] io::Error),
}

/// Файловый sink с ежедневной ротацией.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileConfig {
    pub dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub prefix: String,
}

fn default_file_prefix() -> String {
    "brokermesh.log".to_string()
}

/// Настройки логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Уровень (`info`) или полная директива `EnvFilter`
    /// (`brokermesh=debug,tokio=warn`).
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    /// `None`: только консоль.
    pub file: Option<FileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            with_ansi: true,
            with_target: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Переопределения из окружения: `BROKERMESH_LOG_LEVEL`,
    /// `BROKERMESH_LOG_FORMAT`, `BROKERMESH_LOG_DIR`.
    ///
    /// Некорректный формат игнорируется с сообщением в stderr: подписчик
    /// tracing ещё не установлен.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("BROKERMESH_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("BROKERMESH_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring BROKERMESH_LOG_FORMAT: {e}"),
            }
        }
        if let Ok(dir) = env::var("BROKERMESH_LOG_DIR") {
            let prefix = self
                .file
                .as_ref()
                .map(|f| f.prefix.clone())
                .unwrap_or_else(default_file_prefix);
            self.file = Some(FileConfig {
                dir: PathBuf::from(dir),
                prefix,
            });
        }
    }

    /// Директива для `EnvFilter`. Простой уровень применяется к этому
    /// крейту, остальные крейты пишут только warn и выше.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("brokermesh={level},warn")
        }
    }

    pub fn validate(&self) -> Result<(), LoggingConfigError> {
        EnvFilter::try_new(self.build_filter_directive())
            .map(|_| ())
            .map_err(|_| LoggingConfigError::InvalidLevel(self.level.clone()))
    }

    pub fn ensure_log_dir(&self) -> Result<(), LoggingConfigError> {
        if let Some(file) = &self.file {
            std::fs::create_dir_all(&file.dir)?;
        }
        Ok(())
    }
}
