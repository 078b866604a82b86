//! # Size-bounded Kafka batch producer
//!
//! Accumulates outbound messages per topic and hands them to the broker in
//! batches whose key+value bytes stay under a configured ceiling (broker
//! `message.max.bytes` style limits).
//!
//! ```text
//! handler ──add──▶ BatchProducer(topic) ──send_batch──▶ BatchSender ──▶ Kafka
//!                        │ (greedy, in order)
//!                        └── flush(): send remainder, await every batch
//! ```
//!
//! - Submission order into a topic equals the order of
//!   `add_message_and_maybe_flush` calls.
//! - A failed send surfaces from `flush()` and is never retried here.
//! - Telemetry (logs, Prometheus gauges/histograms) never blocks or fails a
//!   send.

mod error;
mod message;
mod metrics;
mod producer;
mod publisher;
mod sender;
mod topics;

pub use error::{ProducerError, ProducerResult};
pub use message::{DeliveryAck, OutboundMessage};
pub use producer::BatchProducer;
pub use publisher::TopicPublisher;
pub use sender::{BatchSender, KafkaBatchSender, SendFuture};
pub use topics::KafkaTopic;
