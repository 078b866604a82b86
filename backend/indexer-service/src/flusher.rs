use batch_producer::TopicPublisher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// Flush `publisher` every `interval` until `shutdown` turns true, then flush
/// once more before returning
///
/// Handlers only buffer; batches go out here (or earlier, when a topic's batch
/// fills up). A failed flush is logged and the loop keeps going, since the
/// producer does not retry and the next tick covers newly buffered messages.
pub async fn run_periodic_flush(
    publisher: Arc<Mutex<TopicPublisher>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let mut publisher = publisher.lock().await;
                let buffered = publisher.buffered();
                match publisher.flush_all().await {
                    Ok(()) if buffered > 0 => {
                        debug!(at = "publisher_flusher#tick", buffered, "Publisher flushed");
                    }
                    Ok(()) => {}
                    Err(e) => {
                        error!(at = "publisher_flusher#tick", error = %e, "Publisher flush failed");
                    }
                }
            }
        }
    }

    if let Err(e) = publisher.lock().await.flush_all().await {
        error!(at = "publisher_flusher#shutdown", error = %e, "Final publisher flush failed");
    }
    info!(at = "publisher_flusher#shutdown", "Publisher flusher stopped");
}
