//! Prometheus collectors for a running sweep.
//!
//! Collectors stay inert until [`enable`] is called: the recording helpers
//! below are no-ops while metrics are disabled, so a sweep without
//! `metrics.enabled` never touches the registry.

use crate::engine::exchange::IN_FLIGHT_EXCHANGES;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};

static ENABLED: AtomicBool = AtomicBool::new(false);

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref IN_FLIGHT_GAUGE: Gauge = Gauge::new(
        "surge_in_flight_exchanges",
        "Number of exchanges currently connected or waiting on the target"
    )
    .expect("metric can be created");
    pub static ref EXCHANGES_TOTAL: IntCounter = IntCounter::new(
        "surge_exchanges_total",
        "Total number of request/response exchanges launched"
    )
    .expect("metric can be created");
    /// Failed exchanges, labelled by failure kind (connect, write, read, timeout, cancelled)
    pub static ref EXCHANGE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "surge_exchange_failures_total",
            "Total number of exchanges that ended in an error"
        ),
        &["kind"]
    )
    .expect("metric can be created");
    pub static ref BATCHES_TOTAL: IntCounter = IntCounter::new(
        "surge_batches_total",
        "Total number of fully joined batches"
    )
    .expect("metric can be created");
    /// Most recently recorded throughput per command, in requests per second
    pub static ref LAST_THROUGHPUT: GaugeVec = GaugeVec::new(
        Opts::new(
            "surge_last_throughput",
            "Throughput of the most recently recorded cell"
        ),
        &["command"]
    )
    .expect("metric can be created");
    pub static ref CELLS_RECORDED: IntCounter = IntCounter::new(
        "surge_cells_recorded_total",
        "Total number of throughput cells recorded"
    )
    .expect("metric can be created");
}

/// Registers every collector and turns recording on. Idempotent.
pub fn enable() {
    if ENABLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(IN_FLIGHT_GAUGE.clone()),
        Box::new(EXCHANGES_TOTAL.clone()),
        Box::new(EXCHANGE_FAILURES.clone()),
        Box::new(BATCHES_TOTAL.clone()),
        Box::new(LAST_THROUGHPUT.clone()),
        Box::new(CELLS_RECORDED.clone()),
    ];
    for collector in collectors {
        let _ = REGISTRY.register(collector);
    }
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

pub fn record_exchange() {
    if is_enabled() {
        EXCHANGES_TOTAL.inc();
    }
}

pub fn record_failure(kind: &str) {
    if is_enabled() {
        EXCHANGE_FAILURES.with_label_values(&[kind]).inc();
    }
}

pub fn record_batch() {
    if is_enabled() {
        BATCHES_TOTAL.inc();
    }
}

pub fn record_cell(command: &str, throughput: f64) {
    if is_enabled() {
        CELLS_RECORDED.inc();
        LAST_THROUGHPUT.with_label_values(&[command]).set(throughput);
    }
}

/// Text exposition of the registry, with the in-flight gauge sampled at
/// render time. Empty while metrics are disabled.
pub fn render_metrics() -> String {
    IN_FLIGHT_GAUGE.set(IN_FLIGHT_EXCHANGES.load(Ordering::SeqCst) as f64);

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        return format!("# Error encoding metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|_| "# Error: Invalid UTF8".to_string())
}
