//! # Kafka consumer runtime
//!
//! Consumer-group membership, handler fan-out and reconnect handling for the
//! indexer's broker subscriptions.
//!
//! ## Delivery
//!
//! Messages are at-least-once. An offset is stored only after every
//! registered handler settled successfully for that message, and stored
//! offsets are committed once `commit_threshold` messages are pending or
//! `commit_interval` has elapsed, whichever comes first. A crash replays at
//! most the uncommitted window, so handlers must be idempotent.
//!
//! ## Ordering
//!
//! Partition `p` is always dispatched on lane `p mod partitions_consumed_concurrently`,
//! which keeps broker order within a partition while lanes run concurrently.
//!
//! ## Reconnects
//!
//! A transport-level disconnect while not stopped re-creates the client
//! connection and re-issues the subscription immediately. `stop_consumer`
//! marks the runtime stopped before disconnecting, so its own disconnect is
//! never mistaken for a failure.

mod client;
mod commit;
mod error;
mod group;
mod kafka;
mod message;
mod metrics;
mod runtime;
mod state;

pub use client::{ClientEvent, ConsumerClient};
pub use error::{ConsumerError, ConsumerResult, HandlerError};
pub use group::ConsumerGroupIdentity;
pub use kafka::{RdKafkaConsumerClient, TransportWatch};
pub use message::ConsumedMessage;
pub use runtime::{ConsumerRuntime, MessageHandler, RunSettings};
pub use state::ConsumerState;
