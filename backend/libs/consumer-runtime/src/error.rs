//! Error types for the consumer runtime

use thiserror::Error;

/// Result type alias for consumer operations
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Boxed handler error, converted from the `anyhow::Error` a handler returns
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Broker client error (create, subscribe, store, commit)
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// Operation called from a state that does not allow it
    #[error("Invalid consumer state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: String,
    },

    /// Operation requires a connected client
    #[error("Consumer is not connected")]
    NotConnected,

    /// At least one handler failed for a message; its offset was not stored
    #[error("{failed} handler(s) failed for {topic}[{partition}]@{offset}: {source}")]
    Handler {
        topic: String,
        partition: i32,
        offset: i64,
        failed: usize,
        #[source]
        source: HandlerError,
    },

    /// A dispatch lane stopped unexpectedly
    #[error("Dispatch lane {0} closed")]
    LaneClosed(usize),
}

impl ConsumerError {
    pub fn is_handler_failure(&self) -> bool {
        matches!(self, ConsumerError::Handler { .. })
    }
}
