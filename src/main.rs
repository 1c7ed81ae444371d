//! Демонстрация mesh-рассылки внутри одного процесса.
//!
//! Поднимает кольцо брокеров, публикует сообщения на первом из них и
//! печатает, сколько копий получил подписчик каждого брокера.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::{sync::mpsc, time::timeout};
use tracing::{info, warn};

use brokermesh::{
    logging::LogFormat, Broker, BrokerConfig, BrokerSettings, BrokerStats, InProcessTransport,
    Message, Timestamp,
};

#[derive(Parser)]
#[command(name = "brokermesh")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Flood messages through an in-process ring of pub/sub brokers", long_about = None)]
struct Cli {
    /// Количество брокеров в кольце
    #[arg(short, long, default_value_t = 3)]
    brokers: usize,
    /// Количество публикуемых сообщений
    #[arg(short, long, default_value_t = 1)]
    messages: usize,
    /// Тема, создаваемая на каждом брокере
    #[arg(short, long, default_value = "news")]
    topic: String,
    /// Payload каждого сообщения
    #[arg(short, long, default_value = "hello, mesh")]
    payload: String,
    /// Сколько ждать доставки, в миллисекундах
    #[arg(long, default_value_t = 500)]
    wait_ms: u64,
    /// Уровень логирования, если не задан BROKERMESH_LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,
    /// Формат логов (compact, pretty или json), если не задан BROKERMESH_LOG_FORMAT
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Печатать итог в JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct NodeSummary {
    broker: String,
    received: usize,
    stats: BrokerStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.brokers == 0 {
        bail!("at least one broker is required");
    }

    let mut settings = BrokerSettings::load().context("failed to load settings")?;
    if let Some(level) = cli.log_level.clone() {
        settings.log_level = level;
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }
    let _logging = brokermesh::init_logging(settings.logging_config())
        .map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    let transport = Arc::new(InProcessTransport::new());
    let mut nodes = Vec::with_capacity(cli.brokers);
    for i in 0..cli.brokers {
        let config = BrokerConfig {
            id: format!("broker-{i}").into(),
            ..settings.broker_config()
        };
        let broker = Arc::new(Broker::with_config(config, transport.clone()));
        transport.attach(&broker);
        broker.create_topic(&cli.topic)?;

        let subscriber = format!("sub-{i}");
        let rx = transport.endpoint(subscriber.as_str());
        broker.subscribe(&cli.topic, subscriber)?;
        nodes.push((broker, rx));
    }

    // Каждый брокер связан с обоими соседями по кольцу.
    let n = nodes.len();
    if n > 1 {
        for i in 0..n {
            let prev = nodes[(i + n - 1) % n].0.id().clone();
            let next = nodes[(i + 1) % n].0.id().clone();
            nodes[i].0.link_peer(prev);
            nodes[i].0.link_peer(next);
        }
    }
    info!(brokers = n, topic = %cli.topic, "ring ready");

    let origin = Arc::clone(&nodes[0].0);
    for seq in 0..cli.messages {
        let message = Message::builder()
            .payload(cli.payload.clone().into_bytes())
            .property("seq", seq as i64)
            .timestamp(Timestamp::now(origin.id().as_str()))
            .build();
        let report = origin.publish(message, &cli.topic).await?;
        info!(seq, deliveries = report.deliveries, forwards = report.forwards, "published");
    }

    let wait = Duration::from_millis(cli.wait_ms);
    let mut summary = Vec::with_capacity(n);
    for (broker, mut rx) in nodes {
        let received = drain(&mut rx, cli.messages, wait).await;
        if received != cli.messages {
            warn!(broker = %broker.id(), received, expected = cli.messages, "missing copies");
        }
        summary.push(NodeSummary {
            broker: broker.id().to_string(),
            received,
            stats: broker.stats(),
        });
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for node in &summary {
            println!(
                "{:<12} received={:<4} published={} accepted={} forwarded={} duplicates={} failures={}",
                node.broker,
                node.received,
                node.stats.published,
                node.stats.accepted,
                node.stats.forwarded,
                node.stats.duplicates,
                node.stats.failures,
            );
        }
    }
    Ok(())
}

/// Читает копии из канала, пока не придёт `expected` штук или не
/// истечёт `wait` без новых сообщений.
async fn drain(
    rx: &mut mpsc::UnboundedReceiver<Message>,
    expected: usize,
    wait: Duration,
) -> usize {
    let mut received = 0;
    while received < expected {
        match timeout(wait, rx.recv()).await {
            Ok(Some(_)) => received += 1,
            _ => break,
        }
    }
    received
}
