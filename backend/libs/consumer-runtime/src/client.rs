use async_trait::async_trait;

use crate::error::ConsumerResult;
use crate::message::ConsumedMessage;

/// What the broker client hands back from `recv`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Message(ConsumedMessage),
    /// Transport-level loss of the broker connection
    Disconnected,
    /// Non-fatal client error; the client keeps polling
    Error(String),
}

/// Broker client seam used by `ConsumerRuntime`
///
/// `recv` must be cancel-safe: the runtime polls it inside `tokio::select!`
/// alongside its shutdown and commit timers.
#[async_trait]
pub trait ConsumerClient: Send + Sync + 'static {
    /// Establish (or re-establish) the broker connection
    async fn connect(&self) -> ConsumerResult<()>;

    async fn disconnect(&self) -> ConsumerResult<()>;

    async fn subscribe(&self, topics: &[String], from_beginning: bool) -> ConsumerResult<()>;

    async fn recv(&self) -> ClientEvent;

    /// Mark `message` as processed so the next commit covers it
    async fn store_offset(&self, message: &ConsumedMessage) -> ConsumerResult<()>;

    /// Commit every stored offset
    async fn commit(&self) -> ConsumerResult<()>;
}
