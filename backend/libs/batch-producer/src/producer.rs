use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{ProducerError, ProducerResult};
use crate::message::{DeliveryAck, OutboundMessage};
use crate::metrics::{BATCH_MESSAGES, BATCH_SIZE_BYTES, SEND_FAILURES, SEND_LATENCY};
use crate::sender::BatchSender;

/// Greedy size-bounded batcher for a single topic
///
/// Messages are appended in call order; when the next message would push the
/// buffered key+value bytes past `max_batch_size_bytes`, the buffered batch is
/// sent first and the new message starts the next batch. Nothing is re-packed
/// and nothing is retried.
///
/// Sends are started on the tokio runtime as soon as a batch closes, so this
/// must be used from within a runtime. `flush` sends the remainder and waits
/// for every batch started so far.
///
/// # Example
///
/// ```ignore
/// let mut producer = BatchProducer::new("to-websockets-subaccounts", sender, 900_000);
/// for message in messages {
///     producer.add_message_and_maybe_flush(message);
/// }
/// producer.flush().await?;
/// ```
pub struct BatchProducer {
    topic: String,
    sender: Arc<dyn BatchSender>,
    max_batch_size_bytes: usize,
    messages: Vec<OutboundMessage>,
    current_size: usize,
    in_flight: Vec<JoinHandle<ProducerResult<Vec<DeliveryAck>>>>,
}

impl BatchProducer {
    pub fn new(
        topic: impl Into<String>,
        sender: Arc<dyn BatchSender>,
        max_batch_size_bytes: usize,
    ) -> Self {
        Self {
            topic: topic.into(),
            sender,
            max_batch_size_bytes,
            messages: Vec::new(),
            current_size: 0,
            in_flight: Vec::new(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Buffered key+value bytes not yet sent
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    /// Messages buffered but not yet sent
    pub fn buffered(&self) -> usize {
        self.messages.len()
    }

    /// Batch sends started and not yet awaited by `flush`
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Buffer `message`, first sending the current batch if the message would
    /// overflow it
    ///
    /// A message larger than the ceiling on its own is not rejected; it ends up
    /// alone in a batch.
    pub fn add_message_and_maybe_flush(&mut self, message: OutboundMessage) {
        let incoming = message.batch_size();
        if self.current_size + incoming > self.max_batch_size_bytes {
            self.send_batch();
        }
        self.messages.push(message);
        self.current_size += incoming;
    }

    /// Send whatever is buffered and wait for all batches sent so far
    ///
    /// Every outstanding send is awaited even after one fails; the first
    /// failure is returned. Handles stay tracked until they resolve, so a
    /// dropped `flush` future loses nothing.
    pub async fn flush(&mut self) -> ProducerResult<()> {
        self.send_batch();

        let mut first_error = None;
        while let Some(handle) = self.in_flight.first_mut() {
            let outcome = match handle.await {
                Ok(result) => result.map(|_| ()),
                Err(join_err) => Err(ProducerError::TaskFailed(join_err.to_string())),
            };
            self.in_flight.remove(0);
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn send_batch(&mut self) {
        if self.messages.is_empty() {
            self.current_size = 0;
            return;
        }

        let batch = std::mem::take(&mut self.messages);
        let batch_size = std::mem::replace(&mut self.current_size, 0);
        let recomputed_size: usize = batch.iter().map(OutboundMessage::batch_size).sum();
        let count = batch.len();

        info!(
            at = "batch_producer#send_batch",
            topic = %self.topic,
            batch_size,
            recomputed_size,
            count,
            "Sending batch"
        );
        BATCH_SIZE_BYTES
            .with_label_values(&[&self.topic])
            .set(batch_size as i64);
        BATCH_MESSAGES
            .with_label_values(&[&self.topic])
            .set(count as i64);

        let started = Instant::now();
        let delivery = self.sender.send_batch(&self.topic, batch);
        let topic = self.topic.clone();

        self.in_flight.push(tokio::spawn(async move {
            let result = delivery.await;
            let elapsed = started.elapsed();

            SEND_LATENCY
                .with_label_values(&[&topic])
                .observe(elapsed.as_secs_f64());

            match &result {
                Ok(acks) => debug!(
                    at = "batch_producer#send_batch",
                    topic = %topic,
                    acked = acks.len(),
                    latency_ms = elapsed.as_millis() as u64,
                    "Batch acknowledged"
                ),
                Err(e) => {
                    SEND_FAILURES.with_label_values(&[&topic]).inc();
                    error!(
                        at = "batch_producer#send_batch",
                        topic = %topic,
                        count,
                        error = %e,
                        "Batch send failed"
                    );
                }
            }
            result
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::SendFuture;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        batches: Mutex<Vec<Vec<OutboundMessage>>>,
    }

    impl BatchSender for RecordingSender {
        fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> SendFuture {
            let acks = (0..messages.len())
                .map(|i| DeliveryAck {
                    topic: topic.to_string(),
                    partition: 0,
                    offset: i as i64,
                })
                .collect();
            self.batches.lock().unwrap().push(messages);
            Box::pin(async move { Ok(acks) })
        }
    }

    #[tokio::test]
    async fn test_empty_flush_makes_no_broker_call() {
        let sender = Arc::new(RecordingSender::default());
        let mut producer = BatchProducer::new("to-websockets-trades", sender.clone(), 10);

        producer.flush().await.unwrap();
        assert!(sender.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_sent_before_overflowing_message() {
        let sender = Arc::new(RecordingSender::default());
        let mut producer = BatchProducer::new("to-websockets-trades", sender.clone(), 4);

        producer.add_message_and_maybe_flush(OutboundMessage::new("ab"));
        producer.add_message_and_maybe_flush(OutboundMessage::new("cd"));
        assert_eq!(producer.current_size(), 4);
        assert!(sender.batches.lock().unwrap().is_empty());

        producer.add_message_and_maybe_flush(OutboundMessage::new("e"));
        assert_eq!(producer.current_size(), 1);
        assert_eq!(producer.buffered(), 1);
        assert_eq!(producer.in_flight(), 1);
        assert_eq!(sender.batches.lock().unwrap().len(), 1);

        producer.flush().await.unwrap();
        assert_eq!(producer.in_flight(), 0);
        assert_eq!(sender.batches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_key_counts_toward_size() {
        let sender = Arc::new(RecordingSender::default());
        let mut producer = BatchProducer::new("to-websockets-trades", sender.clone(), 5);

        producer.add_message_and_maybe_flush(OutboundMessage::new("abc").with_key("k"));
        producer.add_message_and_maybe_flush(OutboundMessage::new("de").with_key("k"));

        // 4 + 3 > 5, so the first message went out alone
        assert_eq!(sender.batches.lock().unwrap().len(), 1);
        assert_eq!(producer.current_size(), 3);
        producer.flush().await.unwrap();
    }
}
