//! Error types for the batch producer

use thiserror::Error;

/// Result type alias for producer operations
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Errors surfaced by `flush`. Delivery state of the affected batch is unknown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// The broker client refused to enqueue a record (queue full, unknown topic, ...)
    #[error("Failed to enqueue message for {topic}: {reason}")]
    Enqueue { topic: String, reason: String },

    /// The broker rejected or never acknowledged a record
    #[error("Delivery to {topic} failed: {reason}")]
    Delivery { topic: String, reason: String },

    /// Producer client could not be created
    #[error("Producer configuration error: {0}")]
    Configuration(String),

    /// The task driving a batch send panicked or was cancelled
    #[error("Batch send task failed: {0}")]
    TaskFailed(String),
}
