//! Producer to consumer over the in-memory transport

use async_trait::async_trait;
use saga_choreography_log::{
    CompensationError, CompensationHandler, Consumer, InMemoryTransport, Message, NoOpObserver,
    Payload, Producer, SagaContext, SagaOutcome, Transport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TOPIC: &str = "saga_test";

struct Recorder {
    step: &'static str,
    calls: mpsc::UnboundedSender<(&'static str, Message)>,
}

#[async_trait]
impl CompensationHandler for Recorder {
    async fn compensate(&self, message: Message) -> Result<(), CompensationError> {
        let _ = self.calls.send((self.step, message));
        Ok(())
    }
}

struct Harness {
    transport: InMemoryTransport,
    consumer: Arc<Consumer>,
    runner: JoinHandle<()>,
    calls: mpsc::UnboundedReceiver<(&'static str, Message)>,
}

impl Harness {
    async fn start(steps: &[&'static str]) -> Self {
        let transport = InMemoryTransport::default();
        let consumer = Arc::new(
            Consumer::new(TOPIC, Arc::new(transport.clone())).with_observer(Arc::new(NoOpObserver)),
        );
        let (sender, calls) = mpsc::unbounded_channel();
        for step in steps {
            consumer.register_compensation(
                *step,
                Recorder {
                    step: *step,
                    calls: sender.clone(),
                },
            );
        }

        let runner = tokio::spawn({
            let consumer = consumer.clone();
            async move { consumer.run().await }
        });
        while transport.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }

        Self {
            transport,
            consumer,
            runner,
            calls,
        }
    }

    fn producer(&self) -> Producer {
        let transport: Arc<dyn Transport> = Arc::new(self.transport.clone());
        Producer::new(TOPIC, transport).with_observer(Arc::new(NoOpObserver))
    }

    async fn shutdown(self) -> Vec<(&'static str, Message)> {
        self.consumer.stop();
        self.runner.await.unwrap();
        let mut calls = self.calls;
        let mut seen = Vec::new();
        while let Ok(call) = calls.try_recv() {
            seen.push(call);
        }
        seen
    }
}

fn states(payload: &Payload) -> Vec<&str> {
    payload.logs.iter().map(|entry| entry.state.as_str()).collect()
}

#[tokio::test]
async fn failed_saga_compensates_earlier_step_remotely() {
    let mut harness = Harness::start(&["state_transaction_1", "state_transaction_2"]).await;
    let saga = harness.producer().new_saga("123456");

    let tx = saga.clone();
    let result = saga
        .execute(&SagaContext::new(), |ctx| async move {
            tx.transact(&ctx, "state_transaction_1", "message", |_| async {
                Ok::<(), String>(())
            })
            .await?;
            tx.transact(&ctx, "state_transaction_2", json!({"amount": 10}), |_| async {
                Err::<(), _>("error in tx 2".to_string())
            })
            .await
        })
        .await;
    assert_eq!(result, Err("error in tx 2".to_string()));

    let payload = saga.payload();
    assert_eq!(
        states(&payload),
        [
            "SAGA_BEGIN",
            "STATE_state_transaction_1_BEGIN",
            "STATE_state_transaction_1_SUCCESS",
            "STATE_state_transaction_2_BEGIN",
            "STATE_state_transaction_2_FAILED",
            "STATE_state_transaction_1_COMPENSATE",
            "SAGA_FAILED",
            "SAGA_END",
        ]
    );
    assert_eq!(payload.failure(), Some("error in tx 2"));
    assert_eq!(payload.outcome(), SagaOutcome::Failed);
    let compensation = &payload.logs[5];
    assert!(compensation.is_compensation);
    assert_eq!(compensation.origin, "state_transaction_1");

    let ack = saga.published().await.unwrap().unwrap();
    assert_eq!(ack.receivers, 1);

    let (step, message) = tokio::time::timeout(Duration::from_secs(2), harness.calls.recv())
        .await
        .expect("compensation not delivered")
        .unwrap();
    assert_eq!(step, "state_transaction_1");
    assert_eq!(message.saga_id.as_str(), "123456");
    assert_eq!(message.data, json!("message"));

    let rest = harness.shutdown().await;
    assert!(rest.is_empty(), "unexpected compensations: {rest:?}");
}

#[tokio::test]
async fn successful_saga_triggers_no_compensation() {
    let harness = Harness::start(&["reserve", "charge"]).await;
    let saga = harness.producer().new_saga("order-1");

    let tx = saga.clone();
    saga.execute(&SagaContext::new(), |ctx| async move {
        tx.transact(&ctx, "reserve", json!({"sku": "A1"}), |_| async {
            Ok::<(), String>(())
        })
        .await?;
        tx.transact(&ctx, "charge", json!(40), |_| async { Ok::<(), String>(()) })
            .await
    })
    .await
    .unwrap();
    assert_eq!(saga.payload().outcome(), SagaOutcome::Succeeded);
    saga.published().await.unwrap().unwrap();

    // Let the consumer drain the delivery before stopping.
    while harness.consumer.stats().payloads_received == 0 {
        tokio::task::yield_now().await;
    }
    let consumer = harness.consumer.clone();
    let calls = harness.shutdown().await;
    assert!(calls.is_empty());

    let stats = consumer.stats();
    assert_eq!(stats.payloads_received, 1);
    assert_eq!(stats.compensations_dispatched, 0);
}

#[tokio::test]
async fn payloads_from_many_sagas_are_compensated_independently() {
    let mut harness = Harness::start(&["debit"]).await;
    let producer = harness.producer();

    for n in 0..3 {
        let saga = producer.new_saga(format!("saga-{n}"));
        let tx = saga.clone();
        let _ = saga
            .execute(&SagaContext::new(), |ctx| async move {
                tx.transact(&ctx, "debit", json!(n), |_| async { Ok::<(), String>(()) })
                    .await?;
                tx.transact(&ctx, "credit", json!(n), |_| async {
                    Err::<(), _>("account closed".to_string())
                })
                .await
            })
            .await;
        saga.published().await.unwrap().unwrap();
    }

    let mut saga_ids = Vec::new();
    for _ in 0..3 {
        let (step, message) = tokio::time::timeout(Duration::from_secs(2), harness.calls.recv())
            .await
            .expect("compensation not delivered")
            .unwrap();
        assert_eq!(step, "debit");
        assert_eq!(message.data, json!(message.saga_id.as_str()[5..].parse::<i32>().unwrap()));
        saga_ids.push(message.saga_id.to_string());
    }
    saga_ids.sort();
    assert_eq!(saga_ids, ["saga-0", "saga-1", "saga-2"]);

    assert!(harness.shutdown().await.is_empty());
}
