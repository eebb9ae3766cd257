use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, TextEncoder, opts, register_int_counter};

pub static CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "atrium_connections_total",
        "Total number of realtime client connections"
    ))
    .unwrap()
});

pub static MESSAGES_POSTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "atrium_messages_posted_total",
        "Total number of messages persisted"
    ))
    .unwrap()
});

pub static THREADS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "atrium_threads_created_total",
        "Total number of threads created"
    ))
    .unwrap()
});

pub static EVENTS_EMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "atrium_events_emitted_total",
        "Total number of realtime events fanned out to rooms"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
