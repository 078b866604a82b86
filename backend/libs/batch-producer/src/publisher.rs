use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::ProducerResult;
use crate::message::OutboundMessage;
use crate::producer::BatchProducer;
use crate::sender::BatchSender;

/// Routes messages to one `BatchProducer` per topic
///
/// Producers are created on first use and share the sender and byte ceiling.
pub struct TopicPublisher {
    sender: Arc<dyn BatchSender>,
    max_batch_size_bytes: usize,
    producers: BTreeMap<String, BatchProducer>,
}

impl TopicPublisher {
    pub fn new(sender: Arc<dyn BatchSender>, max_batch_size_bytes: usize) -> Self {
        Self {
            sender,
            max_batch_size_bytes,
            producers: BTreeMap::new(),
        }
    }

    pub fn add_message(&mut self, topic: impl AsRef<str>, message: OutboundMessage) {
        let topic = topic.as_ref();
        if !self.producers.contains_key(topic) {
            self.producers.insert(
                topic.to_string(),
                BatchProducer::new(topic, self.sender.clone(), self.max_batch_size_bytes),
            );
        }
        if let Some(producer) = self.producers.get_mut(topic) {
            producer.add_message_and_maybe_flush(message);
        }
    }

    /// Flush every topic; resolves once all sends have completed
    ///
    /// All topics are flushed even if an earlier one fails; the first failure
    /// is returned.
    pub async fn flush_all(&mut self) -> ProducerResult<()> {
        let mut first_error = None;
        for (topic, producer) in self.producers.iter_mut() {
            if let Err(e) = producer.flush().await {
                warn!(
                    at = "topic_publisher#flush_all",
                    topic = %topic,
                    error = %e,
                    "Topic flush failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Messages buffered across all topics
    pub fn buffered(&self) -> usize {
        self.producers.values().map(BatchProducer::buffered).sum()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }
}
