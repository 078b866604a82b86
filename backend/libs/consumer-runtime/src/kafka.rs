use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::client::{ClientEvent, ConsumerClient};
use crate::error::{ConsumerError, ConsumerResult};
use crate::message::ConsumedMessage;

/// Consumer context that flags broker transport loss
///
/// librdkafka reports client-level errors such as `_ALL_BROKERS_DOWN` through
/// the context's error callback rather than through `recv`, so the flag is
/// raised here and picked up by the next `recv`.
#[derive(Default)]
pub struct TransportWatch {
    lost: Notify,
}

impl TransportWatch {
    /// Resolves once a transport failure has been reported. A failure
    /// reported while nobody waits is kept until the next call.
    pub async fn transport_lost(&self) {
        self.lost.notified().await
    }
}

impl ClientContext for TransportWatch {
    fn error(&self, error: KafkaError, reason: &str) {
        if is_transport_failure(&error) {
            warn!(
                at = "kafka_consumer#transport",
                error = %error,
                reason,
                "Broker transport lost"
            );
            self.lost.notify_one();
        } else {
            warn!(at = "kafka_consumer#client_error", error = %error, reason, "Kafka client error");
        }
    }
}

impl ConsumerContext for TransportWatch {}

type WatchedConsumer = StreamConsumer<TransportWatch>;

/// `ConsumerClient` backed by an rdkafka `StreamConsumer`
///
/// The stream consumer is (re)created on every `connect`, so a reconnect
/// starts from a fresh librdkafka handle. The client config should disable
/// auto commit and auto offset store; offsets are stored and committed by the
/// runtime.
pub struct RdKafkaConsumerClient {
    config: ClientConfig,
    from_beginning: AtomicBool,
    consumer: RwLock<Option<Arc<WatchedConsumer>>>,
}

impl RdKafkaConsumerClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            from_beginning: AtomicBool::new(false),
            consumer: RwLock::new(None),
        }
    }

    fn current(&self) -> Option<Arc<WatchedConsumer>> {
        self.consumer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn connected(&self) -> ConsumerResult<Arc<WatchedConsumer>> {
        self.current().ok_or(ConsumerError::NotConnected)
    }

    fn create(&self) -> ConsumerResult<WatchedConsumer> {
        let offset_reset = if self.from_beginning.load(Ordering::SeqCst) {
            "earliest"
        } else {
            "latest"
        };
        let consumer = self
            .config
            .clone()
            .set("auto.offset.reset", offset_reset)
            .create_with_context::<_, WatchedConsumer>(TransportWatch::default())?;
        Ok(consumer)
    }

    fn replace(&self, consumer: Option<WatchedConsumer>) -> Option<Arc<WatchedConsumer>> {
        let mut slot = self
            .consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, consumer.map(Arc::new))
    }
}

/// Errors that mean the broker connection is gone. Client-level errors arrive
/// as `Global` through the context; consumption errors come from `recv`.
fn is_transport_failure(error: &KafkaError) -> bool {
    matches!(
        error,
        KafkaError::Global(
            RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure
        ) | KafkaError::MessageConsumption(
            RDKafkaErrorCode::AllBrokersDown | RDKafkaErrorCode::BrokerTransportFailure
        )
    )
}

#[async_trait]
impl ConsumerClient for RdKafkaConsumerClient {
    async fn connect(&self) -> ConsumerResult<()> {
        let consumer = self.create()?;
        if let Some(previous) = self.replace(Some(consumer)) {
            previous.unsubscribe();
        }
        info!(at = "kafka_consumer#connect", "Kafka consumer created");
        Ok(())
    }

    async fn disconnect(&self) -> ConsumerResult<()> {
        if let Some(consumer) = self.replace(None) {
            consumer.unsubscribe();
            info!(at = "kafka_consumer#disconnect", "Kafka consumer closed");
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[String], from_beginning: bool) -> ConsumerResult<()> {
        let changed = self.from_beginning.swap(from_beginning, Ordering::SeqCst) != from_beginning;
        if changed && self.current().is_some() {
            // auto.offset.reset only applies at creation time
            self.connect().await?;
        }

        let consumer = self.connected()?;
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        info!(
            at = "kafka_consumer#subscribe",
            topics = ?topics,
            from_beginning,
            "Subscribed to Kafka topics"
        );
        Ok(())
    }

    async fn recv(&self) -> ClientEvent {
        let Some(consumer) = self.current() else {
            return ClientEvent::Disconnected;
        };

        tokio::select! {
            biased;
            _ = consumer.context().transport_lost() => ClientEvent::Disconnected,
            received = consumer.recv() => match received {
                Ok(message) => ClientEvent::Message(ConsumedMessage::from(&message)),
                Err(e) if is_transport_failure(&e) => {
                    warn!(at = "kafka_consumer#recv", error = %e, "Broker transport lost");
                    ClientEvent::Disconnected
                }
                Err(e) => ClientEvent::Error(e.to_string()),
            },
        }
    }

    async fn store_offset(&self, message: &ConsumedMessage) -> ConsumerResult<()> {
        let consumer = self.connected()?;
        consumer.store_offset(&message.topic, message.partition, message.offset + 1)?;
        Ok(())
    }

    async fn commit(&self) -> ConsumerResult<()> {
        let consumer = self.connected()?;
        match consumer.commit_consumer_state(CommitMode::Async) {
            Ok(()) => Ok(()),
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!(at = "kafka_consumer#commit", "No stored offsets to commit");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_broker_config() -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", "127.0.0.1:1")
            .set("group.id", "consumer-runtime-test")
            .set("enable.auto.commit", "false");
        config
    }

    #[test]
    fn test_transport_failures_map_to_disconnect() {
        assert!(is_transport_failure(&KafkaError::Global(
            RDKafkaErrorCode::AllBrokersDown
        )));
        assert!(is_transport_failure(&KafkaError::Global(
            RDKafkaErrorCode::BrokerTransportFailure
        )));
        assert!(!is_transport_failure(&KafkaError::Global(
            RDKafkaErrorCode::MessageTimedOut
        )));
        assert!(is_transport_failure(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::AllBrokersDown
        )));
        assert!(is_transport_failure(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure
        )));
        assert!(!is_transport_failure(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::UnknownTopicOrPartition
        )));
    }

    #[tokio::test]
    async fn test_operations_before_connect() {
        let client = RdKafkaConsumerClient::new(ClientConfig::new());

        assert_eq!(client.recv().await, ClientEvent::Disconnected);
        assert!(matches!(
            client.commit().await,
            Err(ConsumerError::NotConnected)
        ));
        assert!(client.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_context_error_callback_flags_transport_loss() {
        let watch = TransportWatch::default();

        watch.error(
            KafkaError::Global(RDKafkaErrorCode::MessageTimedOut),
            "timed out",
        );
        assert!(
            tokio::time::timeout(Duration::from_millis(50), watch.transport_lost())
                .await
                .is_err()
        );

        // Reported before anyone waits; kept for the next waiter
        watch.error(
            KafkaError::Global(RDKafkaErrorCode::AllBrokersDown),
            "1/1 brokers are down",
        );
        tokio::time::timeout(Duration::from_secs(1), watch.transport_lost())
            .await
            .expect("transport loss should be flagged");
    }

    #[tokio::test]
    async fn test_recv_reports_disconnect_raised_through_context() {
        let client = RdKafkaConsumerClient::new(unreachable_broker_config());
        client.connect().await.unwrap();
        client
            .subscribe(&["to-ender".to_string()], false)
            .await
            .unwrap();

        let consumer = client.connected().unwrap();
        consumer.context().error(
            KafkaError::Global(RDKafkaErrorCode::AllBrokersDown),
            "1/1 brokers are down",
        );

        let event = tokio::time::timeout(Duration::from_secs(5), client.recv())
            .await
            .expect("recv should return once transport loss is flagged");
        assert_eq!(event, ClientEvent::Disconnected);

        client.disconnect().await.unwrap();
    }
}
