use rdkafka::message::{BorrowedMessage, Headers, Message};
use std::collections::BTreeMap;

/// A message received from the broker, detached from the client's buffers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Option<BTreeMap<String, Vec<u8>>>,
    /// Broker or producer timestamp in epoch milliseconds
    pub timestamp_ms: Option<i64>,
}

impl ConsumedMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Payload bytes; empty for tombstones
    pub fn payload(&self) -> &[u8] {
        self.value.as_deref().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .as_ref()
            .and_then(|headers| headers.get(name))
            .map(Vec::as_slice)
    }
}

impl From<&BorrowedMessage<'_>> for ConsumedMessage {
    fn from(message: &BorrowedMessage<'_>) -> Self {
        let headers = message.headers().map(|headers| {
            headers
                .iter()
                .filter_map(|header| {
                    header
                        .value
                        .map(|value| (header.key.to_string(), value.to_vec()))
                })
                .collect()
        });

        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
            headers,
            timestamp_ms: message.timestamp().to_millis(),
        }
    }
}
