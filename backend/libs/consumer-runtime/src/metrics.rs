use prometheus::core::Collector;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};
use tracing::warn;

lazy_static::lazy_static! {
    pub(crate) static ref MESSAGES_TOTAL: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new("kafka_consumer_messages_total", "Messages dispatched to handlers"),
            &["topic"],
        )
        .expect("valid metric opts for kafka_consumer_messages_total"),
    );

    pub(crate) static ref HANDLER_FAILURES: IntCounterVec = register(
        IntCounterVec::new(
            Opts::new(
                "kafka_consumer_handler_failures_total",
                "Handler invocations that returned an error",
            ),
            &["topic"],
        )
        .expect("valid metric opts for kafka_consumer_handler_failures_total"),
    );

    pub(crate) static ref RECONNECTS: IntCounter = register(
        IntCounter::new(
            "kafka_consumer_reconnects_total",
            "Reconnects after an unexpected broker disconnect",
        )
        .expect("valid metric opts for kafka_consumer_reconnects_total"),
    );

    pub(crate) static ref COMMITS: IntCounter = register(
        IntCounter::new("kafka_consumer_commits_total", "Offset commits issued")
            .expect("valid metric opts for kafka_consumer_commits_total"),
    );

    pub(crate) static ref DISPATCH_DURATION: Histogram = register(
        Histogram::with_opts(
            HistogramOpts::new(
                "kafka_consumer_dispatch_duration_seconds",
                "Time for every handler of one message to settle",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )
        .expect("valid metric opts for kafka_consumer_dispatch_duration_seconds"),
    );
}

fn register<C: Collector + Clone + 'static>(collector: C) -> C {
    if let Err(e) = prometheus::default_registry().register(Box::new(collector.clone())) {
        warn!("Failed to register consumer metric: {}", e);
    }
    collector
}
