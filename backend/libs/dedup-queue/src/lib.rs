//! Time-windowed per-key admission gate
//!
//! **Problem**: a deposit (or any per-address workflow) can be triggered by
//! several messages at once. Two workflows for the same address running
//! concurrently would race on the same rows and websocket updates.
//!
//! **Solution**: callers claim a key with `add_to_queue` before starting the
//! workflow and release it with `remove_from_queue` when done. A claim that is
//! never released is evicted after a fixed window and logged as a timeout.
//!
//! # Architecture
//! ```text
//! handler ──add_to_queue(key)──▶ [DedupQueue] ──true──▶ run workflow ──remove_from_queue(key)
//!                                     │ false
//!                                     ▼
//!                                   skip
//! ```
//!
//! # Guarantees
//! - Check-and-insert is atomic per key (DashMap entry API)
//! - Re-adding a claimed key fails and leaves its timeout untouched
//! - At most one eviction timer per key; removal aborts it
//! - It is a gate, not a queue: a rejected key is not retried later
//!
//! One instance is built by the composition root and cloned into every
//! component that needs it; clones share state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

mod metrics;

use metrics::{DEDUP_QUEUE_REJECTIONS, DEDUP_QUEUE_SIZE, DEDUP_QUEUE_TIMEOUTS};

/// Eviction window for a claimed key
pub const DEFAULT_PROCESSING_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct QueueEntry {
    inserted_at: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Debug)]
struct Inner {
    entries: DashMap<String, QueueEntry>,
    next_generation: AtomicU64,
    timeout: Duration,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for entry in self.entries.iter() {
            entry.timer.abort();
        }
    }
}

/// Per-key mutual exclusion with automatic eviction
#[derive(Debug, Clone)]
pub struct DedupQueue {
    inner: Arc<Inner>,
}

impl Default for DedupQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSING_TIMEOUT)
    }
}

impl DedupQueue {
    pub fn new(timeout: Duration) -> Self {
        info!(
            at = "dedup_queue#new",
            timeout_secs = timeout.as_secs(),
            "Initializing dedup queue"
        );
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                next_generation: AtomicU64::new(0),
                timeout,
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Claim `key`
    ///
    /// Returns `false` without touching anything if the key is already
    /// claimed. Must be called within a tokio runtime (the eviction timer is a
    /// spawned task).
    pub fn add_to_queue(&self, key: &str) -> bool {
        let admitted = match self.inner.entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
                let timer = spawn_eviction(
                    Arc::downgrade(&self.inner),
                    key.to_string(),
                    generation,
                    self.inner.timeout,
                );
                vacant.insert(QueueEntry {
                    inserted_at: Instant::now(),
                    generation,
                    timer,
                });
                true
            }
        };

        if admitted {
            debug!(at = "dedup_queue#add_to_queue", key, "Key added to queue");
            self.update_size();
        } else {
            DEDUP_QUEUE_REJECTIONS.inc();
            debug!(
                at = "dedup_queue#add_to_queue",
                key, "Key already processing, rejected"
            );
        }
        admitted
    }

    /// Release `key`; releasing an unclaimed key is a no-op
    pub fn remove_from_queue(&self, key: &str) {
        if let Some((_, entry)) = self.inner.entries.remove(key) {
            entry.timer.abort();
            debug!(
                at = "dedup_queue#remove_from_queue",
                key,
                held_ms = entry.inserted_at.elapsed().as_millis() as u64,
                "Key removed from queue"
            );
            self.update_size();
        }
    }

    pub fn is_processing(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// How long `key` has been claimed
    pub fn processing_for(&self, key: &str) -> Option<Duration> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed())
    }

    pub fn queue_size(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn processing_addresses(&self) -> HashSet<String> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drop every claim and cancel every timer. For test teardown and
    /// emergency recovery.
    pub fn clear_queue(&self) {
        let mut cleared = 0usize;
        self.inner.entries.retain(|_, entry| {
            entry.timer.abort();
            cleared += 1;
            false
        });
        info!(at = "dedup_queue#clear_queue", cleared, "Dedup queue cleared");
        self.update_size();
    }

    fn update_size(&self) {
        DEDUP_QUEUE_SIZE.set(self.inner.entries.len() as i64);
    }
}

fn spawn_eviction(
    inner: Weak<Inner>,
    key: String,
    generation: u64,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;

        let Some(inner) = inner.upgrade() else {
            return;
        };
        // A newer claim for the same key owns its own timer
        let evicted = inner
            .entries
            .remove_if(&key, |_, entry| entry.generation == generation);

        if let Some((_, entry)) = evicted {
            DEDUP_QUEUE_TIMEOUTS.inc();
            DEDUP_QUEUE_SIZE.set(inner.entries.len() as i64);
            warn!(
                at = "dedup_queue#timeout",
                key = %key,
                held_ms = entry.inserted_at.elapsed().as_millis() as u64,
                "Processing timed out, key evicted from queue"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_add_is_rejected() {
        let queue = DedupQueue::default();

        assert!(queue.add_to_queue("dydx1abc"));
        assert!(!queue.add_to_queue("dydx1abc"));
        assert_eq!(queue.queue_size(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_key_is_noop() {
        let queue = DedupQueue::default();

        queue.remove_from_queue("dydx1abc");
        assert_eq!(queue.queue_size(), 0);

        assert!(queue.add_to_queue("dydx1abc"));
        queue.remove_from_queue("dydx1abc");
        queue.remove_from_queue("dydx1abc");
        assert!(!queue.is_processing("dydx1abc"));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let queue = DedupQueue::default();
        let handle = queue.clone();

        assert!(queue.add_to_queue("dydx1abc"));
        assert!(handle.is_processing("dydx1abc"));
        assert!(!handle.add_to_queue("dydx1abc"));
    }
}
