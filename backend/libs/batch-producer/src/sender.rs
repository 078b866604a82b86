//! Broker-facing send seam
//!
//! `BatchSender::send_batch` hands every message of a batch to the broker
//! client before it returns, so the order of `send_batch` calls is the order in
//! which messages reach the broker. The returned future only reports delivery.

use futures::future::{self, BoxFuture};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{ProducerError, ProducerResult};
use crate::message::{DeliveryAck, OutboundMessage};

/// Future resolving once the broker has acknowledged a whole batch
pub type SendFuture = BoxFuture<'static, ProducerResult<Vec<DeliveryAck>>>;

/// One broker send call per batch
pub trait BatchSender: Send + Sync + 'static {
    fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> SendFuture;
}

/// rdkafka-backed sender
///
/// The producer should be created with `enable.idempotence = true` and
/// `acks = all`; `KafkaConfig::producer_client_config` sets both.
#[derive(Clone)]
pub struct KafkaBatchSender {
    producer: FutureProducer,
}

impl KafkaBatchSender {
    pub fn new(producer: FutureProducer) -> Self {
        Self { producer }
    }

    pub fn from_config(config: &ClientConfig) -> ProducerResult<Self> {
        let producer: FutureProducer = config
            .create()
            .map_err(|e| ProducerError::Configuration(e.to_string()))?;
        Ok(Self::new(producer))
    }

    pub fn producer(&self) -> &FutureProducer {
        &self.producer
    }
}

fn owned_headers(headers: &BTreeMap<String, Vec<u8>>) -> OwnedHeaders {
    headers.iter().fold(
        OwnedHeaders::new_with_capacity(headers.len()),
        |acc, (key, value)| {
            acc.insert(Header {
                key: key.as_str(),
                value: Some(value.as_slice()),
            })
        },
    )
}

impl BatchSender for KafkaBatchSender {
    fn send_batch(&self, topic: &str, messages: Vec<OutboundMessage>) -> SendFuture {
        let mut deliveries = Vec::with_capacity(messages.len());

        for message in &messages {
            let mut record: FutureRecord<'_, [u8], [u8]> =
                FutureRecord::to(topic).payload(message.value.as_slice());
            if let Some(key) = &message.key {
                record = record.key(key.as_slice());
            }
            if let Some(headers) = &message.headers {
                record = record.headers(owned_headers(headers));
            }

            match self.producer.send_result(record) {
                Ok(delivery) => deliveries.push(delivery),
                Err((err, _)) => {
                    return Box::pin(future::ready(Err(ProducerError::Enqueue {
                        topic: topic.to_string(),
                        reason: err.to_string(),
                    })));
                }
            }
        }

        debug!(topic = %topic, count = deliveries.len(), "Batch enqueued");

        let topic = topic.to_string();
        Box::pin(async move {
            let mut acks = Vec::with_capacity(deliveries.len());
            for delivery in deliveries {
                match delivery.await {
                    Ok(Ok((partition, offset))) => acks.push(DeliveryAck {
                        topic: topic.clone(),
                        partition,
                        offset,
                    }),
                    Ok(Err((err, _))) => {
                        return Err(ProducerError::Delivery {
                            topic,
                            reason: err.to_string(),
                        })
                    }
                    Err(_) => {
                        return Err(ProducerError::Delivery {
                            topic,
                            reason: "delivery report dropped".to_string(),
                        })
                    }
                }
            }
            Ok(acks)
        })
    }
}
