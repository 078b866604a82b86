//! Integration tests for the batch producer
//!
//! These tests verify:
//! 1. Batch byte ceiling holds for every sent batch
//! 2. Submission order is preserved across batches
//! 3. Oversized messages form singleton batches
//! 4. flush() waits for every outstanding send and surfaces failures
//! 5. TopicPublisher routes per topic
//!
//! Run tests:
//! ```bash
//! cargo test --package batch-producer --test batch_producer_test
//! ```

use batch_producer::{
    BatchProducer, BatchSender, DeliveryAck, KafkaTopic, OutboundMessage, ProducerError,
    SendFuture, TopicPublisher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Mock broker that records every batch send call
#[derive(Default)]
struct MockBroker {
    sends: Mutex<Vec<(String, Vec<OutboundMessage>)>>,
    failing_topic: Option<String>,
    gate: Option<Arc<Semaphore>>,
}

impl MockBroker {
    fn failing(topic: &str) -> Self {
        Self {
            failing_topic: Some(topic.to_string()),
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn batches(&self) -> Vec<Vec<OutboundMessage>> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, batch)| batch.clone())
            .collect()
    }

    fn topics(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }
}

impl BatchSender for MockBroker {
    fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> SendFuture {
        let count = messages.len();
        self.sends
            .lock()
            .unwrap()
            .push((topic.to_string(), messages));

        let topic = topic.to_string();
        let fail = self.failing_topic.as_deref() == Some(topic.as_str());
        let gate = self.gate.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _permit = gate.acquire().await.map_err(|e| ProducerError::Delivery {
                    topic: topic.clone(),
                    reason: e.to_string(),
                })?;
            }
            if fail {
                return Err(ProducerError::Delivery {
                    topic,
                    reason: "broker unavailable".to_string(),
                });
            }
            Ok((0..count)
                .map(|i| DeliveryAck {
                    topic: topic.clone(),
                    partition: 0,
                    offset: i as i64,
                })
                .collect())
        })
    }
}

fn values(batch: &[OutboundMessage]) -> Vec<String> {
    batch
        .iter()
        .map(|m| String::from_utf8(m.value.clone()).unwrap())
        .collect()
}

/// Test: 1-byte messages a..f with a 5 byte ceiling
#[tokio::test]
async fn test_five_byte_ceiling_scenario() {
    let broker = Arc::new(MockBroker::default());
    let mut producer = BatchProducer::new("to-websockets-trades", broker.clone(), 5);

    for value in ["a", "b", "c", "d", "e", "f"] {
        producer.add_message_and_maybe_flush(OutboundMessage::new(value));
    }

    // [a..e] went out while adding f
    let batches = broker.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(values(&batches[0]), vec!["a", "b", "c", "d", "e"]);

    producer.flush().await.expect("flush should succeed");

    let batches = broker.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(values(&batches[1]), vec!["f"]);
}

/// Test: every batch respects the ceiling and order is preserved
#[tokio::test]
async fn test_ceiling_and_order_for_mixed_sizes() {
    let broker = Arc::new(MockBroker::default());
    let max = 16;
    let mut producer = BatchProducer::new("to-websockets-subaccounts", broker.clone(), max);

    let input: Vec<OutboundMessage> = (0..50)
        .map(|i| {
            let value = "x".repeat(1 + (i * 7) % 9);
            let message = OutboundMessage::new(format!("{}{}", i, value));
            if i % 3 == 0 {
                message.with_key(vec![b'k'; i % 4])
            } else {
                message.with_header("h", vec![0u8; 64])
            }
        })
        .collect();

    for message in input.clone() {
        producer.add_message_and_maybe_flush(message);
    }
    producer.flush().await.unwrap();

    let batches = broker.batches();
    for batch in &batches {
        assert!(!batch.is_empty(), "no empty batch should be sent");
        let size: usize = batch.iter().map(OutboundMessage::batch_size).sum();
        assert!(
            size <= max || batch.len() == 1,
            "batch of {} bytes exceeds ceiling {}",
            size,
            max
        );
    }

    let flattened: Vec<OutboundMessage> = batches.into_iter().flatten().collect();
    assert_eq!(flattened, input);
}

/// Test: a message larger than the ceiling is sent alone
#[tokio::test]
async fn test_oversized_message_forms_singleton_batch() {
    let broker = Arc::new(MockBroker::default());
    let mut producer = BatchProducer::new("to-websockets-markets", broker.clone(), 4);

    producer.add_message_and_maybe_flush(OutboundMessage::new("ab"));
    producer.add_message_and_maybe_flush(OutboundMessage::new("0123456789"));
    producer.add_message_and_maybe_flush(OutboundMessage::new("c"));
    producer.flush().await.unwrap();

    let batches = broker.batches();
    assert_eq!(batches.len(), 3);
    assert_eq!(values(&batches[0]), vec!["ab"]);
    assert_eq!(values(&batches[1]), vec!["0123456789"]);
    assert_eq!(values(&batches[2]), vec!["c"]);
}

/// Test: flush does not resolve until every outstanding batch is acknowledged
#[tokio::test(start_paused = true)]
async fn test_flush_waits_for_outstanding_batches() {
    let gate = Arc::new(Semaphore::new(0));
    let broker = Arc::new(MockBroker::gated(gate.clone()));
    let mut producer = BatchProducer::new("to-websockets-candles", broker.clone(), 1);

    producer.add_message_and_maybe_flush(OutboundMessage::new("a"));
    producer.add_message_and_maybe_flush(OutboundMessage::new("b"));
    assert_eq!(producer.in_flight(), 1);

    {
        let pending = tokio::time::timeout(Duration::from_millis(50), producer.flush()).await;
        assert!(pending.is_err(), "flush resolved before acks arrived");
    }
    // The abandoned flush still left both sends tracked
    assert_eq!(producer.in_flight(), 2);

    gate.add_permits(2);
    producer.flush().await.unwrap();
    assert_eq!(producer.in_flight(), 0);
    assert_eq!(broker.batches().len(), 2);
}

/// Test: broker failure surfaces from flush, not from add
#[tokio::test]
async fn test_send_failure_rejects_flush() {
    let broker = Arc::new(MockBroker::failing("to-websockets-orderbooks"));
    let mut producer = BatchProducer::new("to-websockets-orderbooks", broker.clone(), 1);

    producer.add_message_and_maybe_flush(OutboundMessage::new("a"));
    producer.add_message_and_maybe_flush(OutboundMessage::new("b"));

    let err = producer.flush().await.unwrap_err();
    assert!(matches!(err, ProducerError::Delivery { .. }));

    // Nothing is retried and the producer is reusable afterwards
    assert_eq!(broker.batches().len(), 2);
    assert_eq!(producer.in_flight(), 0);
    assert_eq!(producer.buffered(), 0);
}

/// Test: publisher keeps one producer per topic
#[tokio::test]
async fn test_topic_publisher_routes_per_topic() {
    let broker = Arc::new(MockBroker::default());
    let mut publisher = TopicPublisher::new(broker.clone(), 1_000);

    publisher.add_message(
        KafkaTopic::ToWebsocketsSubaccounts,
        OutboundMessage::new("sub-1"),
    );
    publisher.add_message(KafkaTopic::ToWebsocketsTrades, OutboundMessage::new("trade-1"));
    publisher.add_message(
        KafkaTopic::ToWebsocketsSubaccounts,
        OutboundMessage::new("sub-2"),
    );
    assert_eq!(publisher.buffered(), 3);

    publisher.flush_all().await.unwrap();
    assert_eq!(publisher.buffered(), 0);

    let mut topics = broker.topics();
    topics.sort();
    assert_eq!(
        topics,
        vec!["to-websockets-subaccounts", "to-websockets-trades"]
    );

    let sends = broker.sends.lock().unwrap();
    let (_, subaccounts) = sends
        .iter()
        .find(|(topic, _)| topic == "to-websockets-subaccounts")
        .unwrap();
    assert_eq!(values(subaccounts), vec!["sub-1", "sub-2"]);
}

/// Test: one failing topic does not stop the others from flushing
#[tokio::test]
async fn test_flush_all_flushes_every_topic_on_failure() {
    let broker = Arc::new(MockBroker::failing("to-websockets-candles"));
    let mut publisher = TopicPublisher::new(broker.clone(), 1_000);

    publisher.add_message(KafkaTopic::ToWebsocketsCandles, OutboundMessage::new("c"));
    publisher.add_message(KafkaTopic::ToWebsocketsTrades, OutboundMessage::new("t"));

    assert!(publisher.flush_all().await.is_err());
    assert_eq!(broker.topics().len(), 2);
}
