use prometheus::core::Collector;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts};
use tracing::warn;

lazy_static::lazy_static! {
    pub(crate) static ref BATCH_SIZE_BYTES: IntGaugeVec = register(
        IntGaugeVec::new(
            Opts::new(
                "kafka_batch_producer_batch_size_bytes",
                "Key plus value bytes of the most recent batch sent per topic",
            ),
            &["topic"],
        )
        .expect("valid metric opts for kafka_batch_producer_batch_size_bytes"),
    );

    pub(crate) static ref BATCH_MESSAGES: IntGaugeVec = register(
        IntGaugeVec::new(
            Opts::new(
                "kafka_batch_producer_batch_messages",
                "Number of messages in the most recent batch sent per topic",
            ),
            &["topic"],
        )
        .expect("valid metric opts for kafka_batch_producer_batch_messages"),
    );

    pub(crate) static ref SEND_LATENCY: HistogramVec = register(
        HistogramVec::new(
            HistogramOpts::new(
                "kafka_batch_producer_send_latency_seconds",
                "Time from enqueueing a batch to the broker acknowledging all of it",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["topic"],
        )
        .expect("valid metric opts for kafka_batch_producer_send_latency_seconds"),
    );

    pub(crate) static ref SEND_FAILURES: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "kafka_batch_producer_send_failures_total",
                "Batches whose send call failed",
            ),
            &["topic"],
        )
        .expect("valid metric opts for kafka_batch_producer_send_failures_total"),
    );
}

fn register<C: Collector + Clone + 'static>(collector: C) -> C {
    if let Err(e) = prometheus::default_registry().register(Box::new(collector.clone())) {
        warn!("Failed to register batch producer metric: {}", e);
    }
    collector
}
