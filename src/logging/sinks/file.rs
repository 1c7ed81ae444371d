use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{fmt, layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::config::FileConfig;

/// Файловый layer с ежедневной ротацией и неблокирующей записью.
///
/// Guard нужно держать живым, пока нужны логи: при drop он дописывает
/// буфер.
pub fn layer_with_config<S>(
    config: &FileConfig
) -> (Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let file_appender = daily(&config.dir, &config.prefix);
    let (writer, guard) = non_blocking(file_appender);

    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(writer);

    (Box::new(layer), guard)
}
