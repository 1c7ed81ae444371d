use std::{hint::black_box, sync::Arc};

use brokermesh::{filter, Broker, BrokerId, InProcessTransport, Message};
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn random_payload(len: usize) -> Bytes {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf[..]);
    Bytes::from(buf)
}

/// Брокер с темой `chan` и `subs` подписчиками, чьи очереди
/// вычитываются фоновыми задачами.
fn broker_with_subscribers(
    rt: &Runtime,
    subs: usize,
) -> Broker {
    let transport = Arc::new(InProcessTransport::new());
    let broker = Broker::new("bench", transport.clone());
    broker.create_topic("chan").unwrap();
    for i in 0..subs {
        let id = format!("sub-{i}");
        let mut rx = transport.endpoint(id.as_str());
        rt.spawn(async move { while rx.recv().await.is_some() {} });
        broker.subscribe("chan", id).unwrap();
    }
    broker
}

fn bench_subscribe(c: &mut Criterion) {
    let broker = Broker::new("bench", Arc::new(InProcessTransport::new()));
    broker.create_topic("chan").unwrap();
    c.bench_function("broker_subscribe", |b| {
        b.iter(|| broker.subscribe("chan", black_box("s")).unwrap())
    });
}

fn bench_create_destroy_topic(c: &mut Criterion) {
    let broker = Broker::new("bench", Arc::new(InProcessTransport::new()));
    c.bench_function("broker_create_destroy_topic", |b| {
        b.iter(|| {
            broker.create_topic(black_box("t")).unwrap();
            broker.destroy_topic("t").unwrap();
        })
    });
}

fn bench_publish(c: &mut Criterion) {
    let rt = runtime();
    let payload = random_payload(256);
    let mut group = c.benchmark_group("publish");
    for subs in [0usize, 1, 10, 100] {
        let broker = broker_with_subscribers(&rt, subs);
        group.bench_with_input(BenchmarkId::from_parameter(subs), &subs, |b, _| {
            b.to_async(&rt).iter(|| async {
                broker
                    .publish(black_box(Message::new(payload.clone())), "chan")
                    .await
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_publish_filtered(c: &mut Criterion) {
    let rt = runtime();
    let transport = Arc::new(InProcessTransport::new());
    let broker = Broker::new("bench", transport.clone());
    broker.create_topic("chan").unwrap();
    for i in 0..10 {
        let id = format!("sub-{i}");
        let mut rx = transport.endpoint(id.as_str());
        rt.spawn(async move { while rx.recv().await.is_some() {} });
        let f = filter::and(
            filter::property_equals("region", if i % 2 == 0 { "eu" } else { "us" }),
            filter::payload_len_greater_than(i * 16),
        );
        broker.subscribe_with_filter("chan", id, f).unwrap();
    }
    let msg = Message::builder()
        .property("region", "eu")
        .payload(random_payload(64))
        .build();

    c.bench_function("publish_10_filtered_subs", |b| {
        b.to_async(&rt).iter(|| async {
            broker.publish(black_box(msg.clone()), "chan").await.unwrap()
        })
    });
}

fn bench_ring_flood(c: &mut Criterion) {
    let rt = runtime();
    let transport = Arc::new(InProcessTransport::new());
    let n = 8;
    let brokers: Vec<Arc<Broker>> = (0..n)
        .map(|i| {
            let broker = Arc::new(Broker::new(format!("b{i}"), transport.clone()));
            transport.attach(&broker);
            broker.create_topic("chan").unwrap();
            broker
        })
        .collect();
    for i in 0..n {
        brokers[i].link_peer(brokers[(i + 1) % n].id().clone());
        brokers[i].link_peer(brokers[(i + n - 1) % n].id().clone());
    }

    c.bench_function("ring_8_publish", |b| {
        b.to_async(&rt).iter(|| async {
            brokers[0]
                .publish(black_box(Message::new("x")), "chan")
                .await
                .unwrap()
        })
    });
}

fn bench_with_broker(c: &mut Criterion) {
    let msg = (0..16).fold(Message::new("x"), |m, i| m.with_broker(&format!("b{i}").into()));
    let next = BrokerId::new("next");
    c.bench_function("message_with_broker_16", |b| {
        b.iter(|| black_box(msg.with_broker(&next)))
    });
}

criterion_group!(
    benches,
    bench_subscribe,
    bench_create_destroy_topic,
    bench_publish,
    bench_publish_filtered,
    bench_ring_flood,
    bench_with_broker,
);
criterion_main!(benches);
