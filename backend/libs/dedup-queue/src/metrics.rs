use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static::lazy_static! {
    /// Keys currently claimed
    pub(crate) static ref DEDUP_QUEUE_SIZE: IntGauge = register_int_gauge!(
        "dedup_queue_size",
        "Number of keys currently being processed"
    )
    .expect("dedup_queue_size metric registration");

    /// Claims refused because the key was already being processed
    pub(crate) static ref DEDUP_QUEUE_REJECTIONS: IntCounter = register_int_counter!(
        "dedup_queue_rejections_total",
        "Total number of add_to_queue calls rejected for an in-flight key"
    )
    .expect("dedup_queue_rejections_total metric registration");

    /// Claims evicted by the timeout instead of an explicit release
    pub(crate) static ref DEDUP_QUEUE_TIMEOUTS: IntCounter = register_int_counter!(
        "dedup_queue_timeouts_total",
        "Total number of keys evicted after the processing timeout"
    )
    .expect("dedup_queue_timeouts_total metric registration");
}
