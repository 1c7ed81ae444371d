//! Конкурентные изменения тем и подписок во время публикаций.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::time::{sleep, Instant};

use brokermesh::{filter, Broker, BrokerError, InProcessTransport, Message, SubscriberId};

const SUBSCRIBERS: usize = 8;
const ROUNDS: usize = 200;

fn sub(i: usize) -> SubscriberId {
    SubscriberId::new(format!("sub-{i}"))
}

/// Тест проверяет, что подписки, отписки, смена фильтров, удаление и
/// создание тем, идущие параллельно с публикациями, не ломают брокер.
///
/// Каждая публикация либо целиком падает с `TopicNotFound`, либо
/// доставляет не больше, чем было подписчиков. Доставки уходят только
/// подписанным конечным точкам, а снимок тем никогда не показывает
/// пакет наполовину созданным.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_management_and_publish() {
    let transport = Arc::new(InProcessTransport::new());
    let broker = Arc::new(Broker::new("b", transport.clone()));
    broker.create_topics(["stable", "churn"]).unwrap();

    let mut endpoints: Vec<_> = (0..SUBSCRIBERS).map(|i| transport.endpoint(sub(i))).collect();
    let mut outsider = transport.endpoint("outsider");
    let reported = Arc::new(AtomicU64::new(0));

    let mut tasks = Vec::new();

    // Подписки на обе темы меняются непрерывно.
    tasks.push(tokio::spawn({
        let broker = broker.clone();
        async move {
            for round in 0..ROUNDS {
                let i = round % SUBSCRIBERS;
                broker.subscribe("stable", sub(i)).unwrap();
                broker
                    .modify_filter(
                        "stable",
                        &sub(i),
                        Some(filter::payload_len_greater_than(round % 3)),
                    )
                    .unwrap();
                if round % 2 == 0 {
                    broker.unsubscribe("stable", &sub(i)).unwrap();
                }

                match broker.subscribe("churn", sub(i)) {
                    Ok(()) | Err(BrokerError::TopicNotFound(_)) => {}
                    Err(e) => panic!("unexpected subscribe error: {e}"),
                }
                match broker.unsubscribe("churn", &sub((i + 1) % SUBSCRIBERS)) {
                    Ok(()) | Err(BrokerError::TopicNotFound(_)) => {}
                    Err(e) => panic!("unexpected unsubscribe error: {e}"),
                }
                tokio::task::yield_now().await;
            }
        }
    }));

    // Тема `churn` удаляется и создаётся заново, пакет `x1`/`x2`
    // создаётся целиком и удаляется по одной теме.
    tasks.push(tokio::spawn({
        let broker = broker.clone();
        async move {
            for _ in 0..ROUNDS {
                broker.destroy_topic("churn").unwrap();
                broker.create_topic("churn").unwrap();
                broker.create_topics(["x1", "x2"]).unwrap();
                broker.destroy_topic("x1").unwrap();
                broker.destroy_topic("x2").unwrap();
                tokio::task::yield_now().await;
            }
        }
    }));

    for _ in 0..2 {
        tasks.push(tokio::spawn({
            let broker = broker.clone();
            let reported = reported.clone();
            async move {
                for _ in 0..ROUNDS {
                    let report = broker.publish(Message::new("ab"), "stable").await.unwrap();
                    assert!(report.deliveries <= SUBSCRIBERS);
                    reported.fetch_add(report.deliveries as u64, Ordering::Relaxed);

                    match broker
                        .publish_to(Message::new("abc"), &["stable", "churn"])
                        .await
                    {
                        Ok(report) => {
                            assert!(report.deliveries <= 2 * SUBSCRIBERS);
                            reported.fetch_add(report.deliveries as u64, Ordering::Relaxed);
                        }
                        Err(e) => assert_eq!(e, BrokerError::TopicNotFound("churn".into())),
                    }
                }
            }
        }));
    }

    tasks.push(tokio::spawn({
        let broker = broker.clone();
        async move {
            for _ in 0..ROUNDS {
                let names = broker.topics();
                assert!(names.contains("stable"), "stable topic vanished: {names:?}");
                assert!(
                    !names.contains("x1") || names.contains("x2"),
                    "half-created batch observed: {names:?}"
                );
                tokio::task::yield_now().await;
            }
        }
    }));

    for task in tasks {
        task.await.expect("worker panicked");
    }

    // Доставки запущены отдельными задачами; ждём, пока все завершатся.
    let expected = reported.load(Ordering::Relaxed);
    let deadline = Instant::now() + Duration::from_secs(5);
    while broker.stats().delivered + broker.stats().failures < expected {
        assert!(Instant::now() < deadline, "deliveries did not settle");
        sleep(Duration::from_millis(10)).await;
    }

    let stats = broker.stats();
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.delivered, expected);

    let mut received = 0u64;
    for rx in &mut endpoints {
        while rx.try_recv().is_ok() {
            received += 1;
        }
    }
    assert_eq!(received, expected);
    assert!(outsider.try_recv().is_err());
}
