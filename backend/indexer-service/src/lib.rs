//! Indexer ingestion service
//!
//! Wires the consumer runtime, dedup queue, position store and batch
//! publisher together. Handlers buffer outbound updates; `flusher` sends them
//! on a fixed cadence. The binary in `main.rs` is the only place these are
//! constructed.

pub mod flusher;
pub mod handlers;
pub mod telemetry;
